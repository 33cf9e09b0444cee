//! Address-keyed groupings of decoded instructions. A [`Chain`] couples a
//! run of machine code bytes with the instruction records decoded from them,
//! a human-readable disassembly, and an optional attached analysis context
//! for downstream passes.

use std::{any::Any, borrow::Cow, collections::BTreeMap, fmt};

use iced_x86::{Decoder, DecoderOptions, Encoder, Formatter, Instruction, NasmFormatter};
use tracing::debug;

use crate::{
    chunk::Chunk,
    error::{Error, Result},
};

/// A group of decoded instructions keyed by its entry virtual address.
/// Invariants held by every constructor: the instruction byte lengths sum to
/// the backing chunk's length, and instruction addresses increase
/// monotonically starting at the chain's address.
///
/// The backing bytes may alias the region of the [`Elf`](crate::elf::Elf)
/// they were carved from; [`Chain::into_owned`] materializes an owned copy
/// when the chain must outlive it.
pub struct Chain<'a> {
    /// The virtual address of the chain's entry point
    address: u64,
    /// The disassembly of the chain, one instruction per line
    text: String,
    /// The bytes the instructions were decoded from
    bytes: Cow<'a, [u8]>,
    /// The decoded instruction records, in address order
    instructions: Vec<Instruction>,
    /// Byte offset within the chain to the instruction decoded there
    map: BTreeMap<usize, Instruction>,
    /// An opaque analysis context attached by a downstream pass
    context: Option<Box<dyn Any>>,
}

impl<'a> Chain<'a> {
    /// The bitness every chain decodes at
    pub const BITNESS: u32 = 64;

    /// Decode a chain from raw bytes, assembling the disassembly text as a
    /// side effect. Fails when any byte run in the chunk does not decode to
    /// a valid instruction.
    pub fn from_bytes(address: u64, chunk: Chunk<'a>) -> Result<Self> {
        let mut decoder =
            Decoder::with_ip(Self::BITNESS, chunk.as_bytes(), address, DecoderOptions::NONE);
        let mut formatter = NasmFormatter::new();
        let mut instructions = Vec::new();
        let mut map = BTreeMap::new();
        let mut text = String::new();

        while decoder.can_decode() {
            let position = decoder.position();
            let instruction = decoder.decode();

            if instruction.is_invalid() {
                return Err(Error::UndecodableInstruction {
                    address: instruction.ip(),
                });
            }

            if !text.is_empty() {
                text.push('\n');
            }

            formatter.format(&instruction, &mut text);
            map.insert(position, instruction);
            instructions.push(instruction);
        }

        debug!(
            address,
            len = chunk.len(),
            instructions = instructions.len(),
            "decoded chain"
        );

        Ok(Self {
            address,
            text,
            bytes: Cow::Borrowed(chunk.as_bytes()),
            instructions,
            map,
            context: None,
        })
    }

    /// Assemble a chain from pre-decoded instructions, synthesizing the
    /// backing bytes and the disassembly text. Each instruction is
    /// re-addressed so the chain's addresses increase from `address`. Fails
    /// when an instruction cannot be encoded.
    pub fn from_instructions(address: u64, instructions: Vec<Instruction>) -> Result<Self> {
        let mut encoder = Encoder::new(Self::BITNESS);
        let mut formatter = NasmFormatter::new();
        let mut instructions = instructions;
        let mut map = BTreeMap::new();
        let mut text = String::new();
        let mut offset = 0usize;

        for instruction in &mut instructions {
            let ip = address + offset as u64;
            instruction.set_ip(ip);

            let size = encoder
                .encode(instruction, ip)
                .map_err(|e| Error::EncodeFailed {
                    reason: e.to_string(),
                })?;

            if !text.is_empty() {
                text.push('\n');
            }

            formatter.format(instruction, &mut text);
            map.insert(offset, *instruction);
            offset += size;
        }

        Ok(Self {
            address,
            text,
            bytes: Cow::Owned(encoder.take_buffer()),
            instructions,
            map,
            context: None,
        })
    }

    /// Assemble a chain from parts the caller already holds. Trusted: the
    /// text, chunk, and instruction list are taken as-is, and the offset map
    /// is rebuilt by walking the instruction lengths.
    pub fn from_parts(
        address: u64,
        text: String,
        chunk: Chunk<'a>,
        instructions: Vec<Instruction>,
    ) -> Self {
        let mut map = BTreeMap::new();
        let mut offset = 0usize;

        for instruction in &instructions {
            map.insert(offset, *instruction);
            offset += instruction.len();
        }

        Self {
            address,
            text,
            bytes: Cow::Borrowed(chunk.as_bytes()),
            instructions,
            map,
            context: None,
        }
    }

    /// The virtual address of the chain's entry point
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The disassembly of the chain, one instruction per line
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The chunk of bytes the instructions were decoded from
    pub fn chunk(&self) -> Chunk<'_> {
        Chunk::new(&self.bytes)
    }

    /// The decoded instruction records, in address order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The map from byte offset within the chain to the instruction decoded
    /// there
    pub fn map(&self) -> &BTreeMap<usize, Instruction> {
        &self.map
    }

    /// The sub-map of entries whose bytes, from the entry's offset onward,
    /// begin with `prefix`'s bytes. Used for byte-pattern search anchored at
    /// instruction boundaries.
    pub fn map_prefix(&self, prefix: &Chunk<'_>) -> BTreeMap<usize, Instruction> {
        self.map
            .iter()
            .filter(|(offset, _)| self.bytes[**offset..].starts_with(prefix.as_bytes()))
            .map(|(offset, instruction)| (*offset, *instruction))
            .collect()
    }

    /// Attach an opaque analysis context; any previous context is replaced.
    /// The chain only stores the handle, for later passes to find.
    pub fn set_context(&mut self, context: Box<dyn Any>) {
        self.context = Some(context);
    }

    /// The attached analysis context, if any pass has attached one
    pub fn context(&self) -> Option<&dyn Any> {
        self.context.as_deref()
    }

    /// Mutable access to the attached analysis context
    pub fn context_mut(&mut self) -> Option<&mut dyn Any> {
        self.context.as_deref_mut()
    }

    /// Detach and return the analysis context
    pub fn take_context(&mut self) -> Option<Box<dyn Any>> {
        self.context.take()
    }

    /// Materialize an owned copy of the backing bytes so the chain no
    /// longer borrows the region it was carved from
    pub fn into_owned(self) -> Chain<'static> {
        Chain {
            address: self.address,
            text: self.text,
            bytes: Cow::Owned(self.bytes.into_owned()),
            instructions: self.instructions,
            map: self.map,
            context: self.context,
        }
    }
}

impl fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("address", &self.address)
            .field("text", &self.text)
            .field("bytes", &self.bytes)
            .field("instructions", &self.instructions)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use iced_x86::Code;

    const NOP_NOP_RET: [u8; 3] = [0x90, 0x90, 0xc3];

    #[test]
    fn test_decode_from_bytes() {
        let chain = Chain::from_bytes(0x400000, Chunk::new(&NOP_NOP_RET)).unwrap();

        assert_eq!(chain.address(), 0x400000);
        assert_eq!(chain.instructions().len(), 3);
        assert_eq!(
            chain
                .instructions()
                .iter()
                .map(|i| i.ip())
                .collect::<Vec<_>>(),
            vec![0x400000, 0x400001, 0x400002]
        );
        assert_eq!(
            chain.instructions().iter().map(|i| i.len()).sum::<usize>(),
            chain.chunk().len()
        );
        assert_eq!(chain.text().matches("nop").count(), 2);
        assert_eq!(chain.text().matches("ret").count(), 1);
    }

    #[test]
    fn test_offset_map_tracks_instruction_starts() {
        let chain = Chain::from_bytes(0x400000, Chunk::new(&NOP_NOP_RET)).unwrap();
        assert_eq!(chain.map().keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(chain.map()[&2].code(), Code::Retnq);
    }

    #[test]
    fn test_undecodable_byte_is_fatal() {
        // 0x06 (push es) does not exist in 64-bit mode
        let bytes = [0x90, 0x06];
        assert_eq!(
            Chain::from_bytes(0x400000, Chunk::new(&bytes)).unwrap_err(),
            Error::UndecodableInstruction { address: 0x400001 }
        );
    }

    #[test]
    fn test_assemble_from_instructions() {
        let chain = Chain::from_instructions(
            0x400000,
            vec![Instruction::with(Code::Nopd), Instruction::with(Code::Retnq)],
        )
        .unwrap();

        assert_eq!(chain.chunk().as_bytes(), &[0x90, 0xc3]);
        assert_eq!(chain.map().keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(chain.instructions()[1].ip(), 0x400001);
        assert!(chain.text().contains("nop"));
        assert!(chain.text().contains("ret"));
    }

    #[test]
    fn test_map_prefix_restricts_entries() {
        let chain = Chain::from_bytes(0x400000, Chunk::new(&NOP_NOP_RET)).unwrap();

        let prefix = [0x90u8, 0xc3];
        let matches = chain.map_prefix(&Chunk::new(&prefix));
        assert_eq!(matches.keys().copied().collect::<Vec<_>>(), vec![1]);

        let ret = [0xc3u8];
        let matches = chain.map_prefix(&Chunk::new(&ret));
        assert_eq!(matches.keys().copied().collect::<Vec<_>>(), vec![2]);

        assert!(chain.map_prefix(&Chunk::new(&[0xccu8])).is_empty());
    }

    #[test]
    fn test_context_storage_and_retrieval() {
        let chain = Chain::from_bytes(0x400000, Chunk::new(&NOP_NOP_RET)).unwrap();
        let mut chain = chain.into_owned();

        assert!(chain.context().is_none());
        chain.set_context(Box::new("solver state".to_string()));
        assert_eq!(
            chain
                .context()
                .and_then(|c| c.downcast_ref::<String>())
                .map(String::as_str),
            Some("solver state")
        );
        assert!(chain.take_context().is_some());
        assert!(chain.context().is_none());
    }

    #[test]
    fn test_parts_round_trip() {
        let decoded = Chain::from_bytes(0x401000, Chunk::new(&NOP_NOP_RET)).unwrap();
        let rebuilt = Chain::from_parts(
            decoded.address(),
            decoded.text().to_string(),
            Chunk::new(&NOP_NOP_RET),
            decoded.instructions().to_vec(),
        );

        assert_eq!(rebuilt.map().len(), decoded.map().len());
        assert_eq!(rebuilt.chunk(), decoded.chunk());
        assert_eq!(rebuilt.text(), decoded.text());
    }
}
