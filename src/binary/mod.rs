//! The Neutron binary format: a self-describing container a [`Module`] can be
//! serialized to and read back from.
//!
//! Split the way the parser is split: `primitives.rs` owns byte-level
//! reading/writing (fixed-width little-endian ints, LEB128 varints, IEEE-754
//! doubles), `codes.rs` the enum↔wire-tag tables, `reader.rs`/`writer.rs` the
//! structural decode/encode, `error.rs` the read-error taxonomy.

mod codes;
mod error;
mod primitives;
mod reader;
mod writer;

pub use error::{ReadError, ReadOutcome};
pub use reader::read_byte_code;
pub use writer::write_byte_code;

use crate::module::Module;

const SIGNATURE_LENGTH: usize = 4;
const SIGNATURE: &[u8; SIGNATURE_LENGTH] = b"\0NTR";
const FORMAT_VERSION: u32 = 0;

const CHUNK_END_OF_MODULE: u8 = 0x00;
const CHUNK_FUNCTIONS: u8 = 0x01;
const CHUNK_NATIVE_BINDINGS: u8 = 0x02;
const CHUNK_GLOBALS: u8 = 0x03;
const CHUNK_CONSTANTS: u8 = 0x04;
const CHUNK_SOURCE_DEBUG_SYMBOLS: u8 = 0x80;

const GLOBAL_FLAG_CONSTANT: u8 = 1;

/// Controls what the reader keeps. Debug symbols are loaded by default.
#[derive(Debug, Clone, Copy)]
pub struct ReadSettings {
    pub load_debug_symbols: bool,
}

impl Default for ReadSettings {
    fn default() -> Self {
        Self { load_debug_symbols: true }
    }
}

/// Controls what the writer emits. Debug symbols are stored by default.
#[derive(Debug, Clone, Copy)]
pub struct WriteSettings {
    pub store_debug_symbols: bool,
}

impl Default for WriteSettings {
    fn default() -> Self {
        Self { store_debug_symbols: true }
    }
}

/// Convenience wrapper matching [`write_byte_code`]'s counterpart name.
pub fn read_module(data: &[u8], settings: &ReadSettings) -> ReadOutcome<Module> {
    read_byte_code(data, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{BlockDebugSymbol, FunctionDebugSymbol, FunctionDefinition, GlobalDefinition, Instruction, Opcode};
    use crate::token::{SourcePosition, Token, TokenType};
    use crate::value::Value;

    #[test]
    fn header_roundtrip_rejects_bad_signature() {
        let module = Module::new();
        let mut bytes = write_byte_code(&module, &WriteSettings::default());
        bytes[0] = b'X';
        assert_eq!(read_module(&bytes, &ReadSettings::default()).unwrap_err(), ReadError::InvalidSignature);
    }

    #[test]
    fn empty_module_roundtrips() {
        let module = Module::new();
        let bytes = write_byte_code(&module, &WriteSettings::default());
        let back = read_module(&bytes, &ReadSettings::default()).unwrap();
        assert_eq!(back.functions.len(), 0);
        assert_eq!(back.globals.len(), 0);
        assert_eq!(back.constants.len(), 0);
    }

    #[test]
    fn function_with_debug_symbols_roundtrips() {
        let mut module = Module::new();
        let mut main = FunctionDefinition::new("main", 1, 1, 0, 1);
        main.code = vec![Instruction::new(Opcode::PushLocal, 0), Instruction::bare(Opcode::Return)];
        main.debug_symbol = Some(FunctionDebugSymbol { token: Token::new(TokenType::Identifier, SourcePosition::default()), source_idx: 0 });
        module.append_function(main);
        module.append_constant(Value::Integer(42));
        module.append_global(GlobalDefinition::new("g", Value::String(b"hi".to_vec()), true));

        let bytes = write_byte_code(&module, &WriteSettings::default());
        let back = read_module(&bytes, &ReadSettings::default()).unwrap();

        assert_eq!(back.functions.len(), 1);
        assert_eq!(back.functions[0].name, "main");
        assert_eq!(back.functions[0].code, module.functions[0].code);
        assert!(back.functions[0].debug_symbol.is_some());
        assert_eq!(back.constants, vec![Value::Integer(42)]);
        assert_eq!(back.globals[0].name, "g");
        assert!(back.globals[0].is_constant);
    }

    #[test]
    fn load_debug_symbols_false_skips_function_debug_symbol() {
        let mut module = Module::new();
        let mut main = FunctionDefinition::new("main", 0, 0, 0, 0);
        main.debug_symbol = Some(FunctionDebugSymbol { token: Token::new(TokenType::Identifier, SourcePosition::default()), source_idx: 0 });
        module.append_function(main);

        let bytes = write_byte_code(&module, &WriteSettings::default());
        let back = read_module(&bytes, &ReadSettings { load_debug_symbols: false }).unwrap();
        assert!(back.functions[0].debug_symbol.is_none());
    }

    #[test]
    fn block_debug_symbols_roundtrip_without_a_function_debug_symbol() {
        let mut module = Module::new();
        let mut main = FunctionDefinition::new("main", 0, 0, 0, 0);
        main.debug_symbol = None;
        main.code_debug_symbols = vec![BlockDebugSymbol { token: Token::new(TokenType::Identifier, SourcePosition::default()), code_start_index: 0 }];
        module.append_function(main);

        let bytes = write_byte_code(&module, &WriteSettings::default());
        let back = read_module(&bytes, &ReadSettings::default()).unwrap();

        assert!(back.functions[0].debug_symbol.is_none());
        assert_eq!(back.functions[0].code_debug_symbols.len(), 1);
    }

    #[test]
    fn list_value_roundtrips() {
        let mut module = Module::new();
        let list: crate::list::ValueList = [Value::Integer(1), Value::Double(2.5)].into_iter().collect();
        module.append_constant(Value::List(list));

        let bytes = write_byte_code(&module, &WriteSettings::default());
        let back = read_module(&bytes, &ReadSettings::default()).unwrap();
        assert_eq!(back.constants, module.constants);
    }

    #[test]
    fn huge_declared_list_count_fails_fast_instead_of_allocating() {
        use super::primitives::ByteWriter;

        // A CHUNK_FUNCTIONS body declaring a list of u64::MAX functions, but
        // with no actual function bytes behind it.
        let mut body = ByteWriter::new();
        body.write_u64(u64::MAX);
        let body = body.into_bytes();

        let mut w = ByteWriter::new();
        w.write_data(SIGNATURE);
        w.write_u32(FORMAT_VERSION);
        w.write_u64(0); // module body size prefix, unchecked by the reader
        w.write_u8(CHUNK_FUNCTIONS);
        w.write_u64(body.len() as u64);
        w.write_data(&body);
        w.write_u8(CHUNK_END_OF_MODULE);
        w.write_u64(0);
        let bytes = w.into_bytes();

        assert_eq!(read_module(&bytes, &ReadSettings::default()).unwrap_err(), ReadError::UnexpectedEof);
    }

    #[test]
    fn unsupported_chunk_type_is_rejected() {
        let module = Module::new();
        let mut bytes = write_byte_code(&module, &WriteSettings::default());
        // Splice a mandatory-but-unknown chunk type (0x05) with an empty body
        // right before the CHUNK_END_OF_MODULE terminator.
        let eof_marker = [CHUNK_END_OF_MODULE, 0];
        let insert_at = bytes.len() - eof_marker.len();
        bytes.splice(insert_at..insert_at, [0x05, 0]);
        assert_eq!(read_module(&bytes, &ReadSettings::default()).unwrap_err(), ReadError::UnsupportedChunkType);
    }
}
