//! Decodes the Neutron binary format into a [`Module`].

use crate::list::ValueList;
use crate::module::{BlockDebugSymbol, FunctionDebugSymbol, FunctionDefinition, GlobalDefinition, Instruction, Module, SourceDebugSymbol};
use crate::token::{SourcePosition, Token};
use crate::value::Value;

use super::codes::{self, VALUE_TAG_CUSTOM, VALUE_TAG_DOUBLE, VALUE_TAG_FUNCTION_REFERENCE, VALUE_TAG_INTEGER, VALUE_TAG_LIST, VALUE_TAG_NATIVE_FUNCTION_REFERENCE, VALUE_TAG_STRING, VALUE_TAG_VOID};
use super::error::{ReadError, ReadOutcome};
use super::primitives::ByteReader;
use super::{ReadSettings, CHUNK_CONSTANTS, CHUNK_END_OF_MODULE, CHUNK_FUNCTIONS, CHUNK_GLOBALS, CHUNK_NATIVE_BINDINGS, CHUNK_SOURCE_DEBUG_SYMBOLS, FORMAT_VERSION, GLOBAL_FLAG_CONSTANT, SIGNATURE};

/// Reads a complete Module: header then body.
pub fn read_byte_code(data: &[u8], settings: &ReadSettings) -> ReadOutcome<Module> {
    let mut reader = ByteReader::new(data);
    read_header(&mut reader)?;
    read_module(&mut reader, settings)
}

fn read_header(reader: &mut ByteReader<'_>) -> ReadOutcome<()> {
    let sig = reader.read_data(SIGNATURE.len())?;
    if sig != SIGNATURE.as_slice() {
        return Err(ReadError::InvalidSignature);
    }
    let version = reader.read_u32()?;
    if version != FORMAT_VERSION {
        return Err(ReadError::UnsupportedVersion);
    }
    Ok(())
}

fn read_string(reader: &mut ByteReader<'_>, require_valid_utf8: bool) -> ReadOutcome<Vec<u8>> {
    let length = reader.read_u64()? as usize;
    let bytes = reader.read_data(length)?;
    if require_valid_utf8 && std::str::from_utf8(&bytes).is_err() {
        return Err(ReadError::InvalidUtf8Encoding);
    }
    Ok(bytes)
}

fn read_utf8_string(reader: &mut ByteReader<'_>) -> ReadOutcome<String> {
    let bytes = read_string(reader, true)?;
    // read_string already validated UTF-8 above.
    Ok(String::from_utf8(bytes).expect("validated UTF-8"))
}

fn read_source_position(reader: &mut ByteReader<'_>) -> ReadOutcome<SourcePosition> {
    let line = reader.read_u64()? as usize;
    let char = reader.read_u64()? as usize;
    let byte_index = reader.read_u64()? as usize;
    let char_span = reader.read_u64()? as usize;
    Ok(SourcePosition { line, char, byte_index, char_span })
}

fn read_token(reader: &mut ByteReader<'_>) -> ReadOutcome<Token> {
    let token_type = codes::u16_to_token_type(reader.read_u16()?);
    let source_pos = read_source_position(reader)?;
    Ok(Token::new(token_type, source_pos))
}

fn read_function_debug_symbol(reader: &mut ByteReader<'_>) -> ReadOutcome<FunctionDebugSymbol> {
    let token = read_token(reader)?;
    let source_idx = reader.read_u64()? as usize;
    Ok(FunctionDebugSymbol { token, source_idx })
}

fn read_block_debug_symbol(reader: &mut ByteReader<'_>) -> ReadOutcome<BlockDebugSymbol> {
    let token = read_token(reader)?;
    let code_start_index = reader.read_u64()? as usize;
    Ok(BlockDebugSymbol { token, code_start_index })
}

fn read_instruction(reader: &mut ByteReader<'_>) -> ReadOutcome<Instruction> {
    let opcode = codes::u8_to_opcode(reader.read_u8()?)?;
    let arg0 = reader.read_i64()?;
    Ok(Instruction::new(opcode, arg0))
}

/// Caps the up-front allocation a declared list/string length can trigger;
/// a corrupted or hostile length prefix still fails fast via `UnexpectedEof`
/// as soon as the backing bytes run out, it just can't force a multi-gigabyte
/// allocation before the first byte is even checked.
const MAX_UPFRONT_CAPACITY: usize = 4096;

fn read_list<T>(reader: &mut ByteReader<'_>, mut item: impl FnMut(&mut ByteReader<'_>) -> ReadOutcome<T>) -> ReadOutcome<Vec<T>> {
    let size = reader.read_u64()?;
    let mut out = Vec::with_capacity((size as usize).min(MAX_UPFRONT_CAPACITY));
    for _ in 0..size {
        out.push(item(reader)?);
    }
    Ok(out)
}

fn read_value_list(reader: &mut ByteReader<'_>, settings: &ReadSettings) -> ReadOutcome<ValueList> {
    let size = reader.read_u64()?;
    let mut out = ValueList::new();
    for _ in 0..size {
        out.push_back(read_value(reader, settings)?);
    }
    Ok(out)
}

fn read_value(reader: &mut ByteReader<'_>, settings: &ReadSettings) -> ReadOutcome<Value> {
    let tag = reader.read_u8()?;
    reader.read_sized(|reader| match tag {
        VALUE_TAG_VOID => Ok(Value::Void),
        VALUE_TAG_INTEGER => Ok(Value::Integer(reader.read_i64()?)),
        VALUE_TAG_DOUBLE => Ok(Value::Double(reader.read_f64()?)),
        VALUE_TAG_FUNCTION_REFERENCE => Ok(Value::FunctionReference(reader.read_i64()?)),
        VALUE_TAG_NATIVE_FUNCTION_REFERENCE => Ok(Value::NativeFunctionReference(reader.read_i64()?)),
        VALUE_TAG_LIST => Ok(Value::List(read_value_list(reader, settings)?)),
        VALUE_TAG_STRING => Ok(Value::String(read_string(reader, false)?)),
        VALUE_TAG_CUSTOM => Err(ReadError::UnsupportedCustomDataType),
        _ => Err(ReadError::UnsupportedValueType),
    })
}

fn read_function_definition(reader: &mut ByteReader<'_>, settings: &ReadSettings) -> ReadOutcome<FunctionDefinition> {
    let name = read_utf8_string(reader)?;
    let arity = reader.read_u64()? as usize;
    let returns = reader.read_u64()? as usize;
    let stack_arity = reader.read_u64()? as usize;
    let locals_count = reader.read_u64()? as usize;

    let code = reader.read_sized(|reader| read_list(reader, read_instruction))?;

    let (debug_symbol, code_debug_symbols) = reader.read_sized(|reader| {
        if !settings.load_debug_symbols || reader.is_at_end_of_file() {
            reader.discard_bytes();
            return Ok((None, Vec::new()));
        }
        let symbol = if reader.read_u8()? == 1 { Some(read_function_debug_symbol(reader)?) } else { None };
        let blocks = read_list(reader, read_block_debug_symbol)?;
        Ok((symbol, blocks))
    })?;

    let mut def = FunctionDefinition::new(name, arity, returns, stack_arity, locals_count);
    def.code = code;
    def.debug_symbol = debug_symbol;
    def.code_debug_symbols = code_debug_symbols;
    Ok(def)
}

fn read_global_definition(reader: &mut ByteReader<'_>, settings: &ReadSettings) -> ReadOutcome<GlobalDefinition> {
    let name = read_utf8_string(reader)?;
    let flags = reader.read_u8()?;
    let is_constant = flags & GLOBAL_FLAG_CONSTANT != 0;
    let initial_value = read_value(reader, settings)?;

    let debug_symbol = reader.read_sized(|reader| {
        if !settings.load_debug_symbols {
            reader.discard_bytes();
            return Ok(None);
        }
        if reader.is_at_end_of_file() {
            return Ok(None);
        }
        read_token(reader).map(Some)
    })?;

    let mut def = GlobalDefinition::new(name, initial_value, is_constant);
    def.debug_symbol = debug_symbol;
    Ok(def)
}

fn read_source_debug_symbol(reader: &mut ByteReader<'_>) -> ReadOutcome<SourceDebugSymbol> {
    let path = read_utf8_string(reader)?;
    let source_text = read_utf8_string(reader)?;
    Ok(SourceDebugSymbol { path, source_text })
}

fn read_module(reader: &mut ByteReader<'_>, settings: &ReadSettings) -> ReadOutcome<Module> {
    // The body-size prefix bounds nothing on the read side; the writer emits
    // it mechanically (it wraps the whole chunk sequence in a sized block),
    // but the reader just walks chunks until `CHUNK_END_OF_MODULE`.
    reader.read_u64()?;

    let mut module = Module::new();
    loop {
        let chunk_type = reader.read_u8()?;
        reader.read_sized(|reader| match chunk_type {
            CHUNK_END_OF_MODULE => Ok(()),
            CHUNK_FUNCTIONS => {
                module.functions = read_list(reader, |r| read_function_definition(r, settings))?;
                Ok(())
            }
            CHUNK_NATIVE_BINDINGS => {
                module.native_bindings = read_list(reader, |r| read_function_definition(r, settings))?;
                Ok(())
            }
            CHUNK_GLOBALS => {
                module.globals = read_list(reader, |r| read_global_definition(r, settings))?;
                Ok(())
            }
            CHUNK_CONSTANTS => {
                module.constants = read_list(reader, |r| read_value(r, settings))?;
                Ok(())
            }
            CHUNK_SOURCE_DEBUG_SYMBOLS => {
                if settings.load_debug_symbols {
                    module.source_debug_symbols = read_list(reader, read_source_debug_symbol)?;
                } else {
                    reader.discard_bytes();
                }
                Ok(())
            }
            _ if chunk_type >= 0x80 => {
                reader.discard_bytes();
                Ok(())
            }
            _ => Err(ReadError::UnsupportedChunkType),
        })?;
        if chunk_type == CHUNK_END_OF_MODULE {
            break;
        }
    }
    module.sync_native_function_slots();
    Ok(module)
}
