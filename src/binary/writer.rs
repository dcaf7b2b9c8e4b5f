//! Encodes a [`Module`] into the Neutron binary format.

use crate::list::ValueList;
use crate::module::{BlockDebugSymbol, FunctionDebugSymbol, FunctionDefinition, GlobalDefinition, Instruction, Module, SourceDebugSymbol};
use crate::token::{SourcePosition, Token};
use crate::value::Value;

use super::codes::{self, VALUE_TAG_CUSTOM, VALUE_TAG_DOUBLE, VALUE_TAG_FUNCTION_REFERENCE, VALUE_TAG_INTEGER, VALUE_TAG_LIST, VALUE_TAG_NATIVE_FUNCTION_REFERENCE, VALUE_TAG_STRING, VALUE_TAG_VOID};
use super::primitives::ByteWriter;
use super::{WriteSettings, CHUNK_CONSTANTS, CHUNK_END_OF_MODULE, CHUNK_FUNCTIONS, CHUNK_GLOBALS, CHUNK_NATIVE_BINDINGS, CHUNK_SOURCE_DEBUG_SYMBOLS, FORMAT_VERSION, GLOBAL_FLAG_CONSTANT, SIGNATURE};

/// Writes a complete Module: header then body. Always succeeds for a
/// well-formed `Module` (a `Custom` value anywhere would be the only way to
/// fail, and nothing constructs one outside a live `ExecutionContext`).
#[must_use]
pub fn write_byte_code(module: &Module, settings: &WriteSettings) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    write_header(&mut writer);
    write_module(&mut writer, module, settings);
    writer.into_bytes()
}

fn write_header(writer: &mut ByteWriter) {
    writer.write_data(SIGNATURE);
    writer.write_u32(FORMAT_VERSION);
}

fn write_string(writer: &mut ByteWriter, bytes: &[u8]) {
    writer.write_u64(bytes.len() as u64);
    writer.write_data(bytes);
}

fn write_source_position(writer: &mut ByteWriter, pos: &SourcePosition) {
    writer.write_u64(pos.line as u64);
    writer.write_u64(pos.char as u64);
    writer.write_u64(pos.byte_index as u64);
    writer.write_u64(pos.char_span as u64);
}

fn write_token(writer: &mut ByteWriter, token: &Token) {
    writer.write_u16(codes::token_type_to_u16(token.token_type));
    write_source_position(writer, &token.source_pos);
}

fn write_function_debug_symbol(writer: &mut ByteWriter, symbol: &FunctionDebugSymbol) {
    write_token(writer, &symbol.token);
    writer.write_u64(symbol.source_idx as u64);
}

fn write_block_debug_symbol(writer: &mut ByteWriter, symbol: &BlockDebugSymbol) {
    write_token(writer, &symbol.token);
    writer.write_u64(symbol.code_start_index as u64);
}

fn write_instruction(writer: &mut ByteWriter, instr: &Instruction) {
    writer.write_u8(codes::opcode_to_u8(instr.opcode));
    writer.write_i64(instr.arg0);
}

fn write_list<T>(writer: &mut ByteWriter, items: &[T], mut item: impl FnMut(&mut ByteWriter, &T)) {
    writer.write_u64(items.len() as u64);
    for value in items {
        item(writer, value);
    }
}

fn write_value_list(writer: &mut ByteWriter, list: &ValueList, settings: &WriteSettings) {
    writer.write_u64(list.len() as u64);
    for value in list {
        write_value(writer, value, settings);
    }
}

fn write_value(writer: &mut ByteWriter, value: &Value, settings: &WriteSettings) {
    let tag = match value {
        Value::Void => VALUE_TAG_VOID,
        Value::Integer(_) => VALUE_TAG_INTEGER,
        Value::Double(_) => VALUE_TAG_DOUBLE,
        Value::FunctionReference(_) => VALUE_TAG_FUNCTION_REFERENCE,
        Value::NativeFunctionReference(_) => VALUE_TAG_NATIVE_FUNCTION_REFERENCE,
        Value::List(_) => VALUE_TAG_LIST,
        Value::String(_) => VALUE_TAG_STRING,
        Value::Custom(_) => VALUE_TAG_CUSTOM,
    };
    writer.write_u8(tag);
    writer.write_sized(|writer| match value {
        Value::Void | Value::Custom(_) => {}
        Value::Integer(i) | Value::FunctionReference(i) | Value::NativeFunctionReference(i) => writer.write_i64(*i),
        Value::Double(d) => writer.write_f64(*d),
        Value::List(list) => write_value_list(writer, list, settings),
        Value::String(bytes) => write_string(writer, bytes),
    });
}

fn write_function_definition(writer: &mut ByteWriter, def: &FunctionDefinition, settings: &WriteSettings) {
    write_string(writer, def.name.as_bytes());
    writer.write_u64(def.arity as u64);
    writer.write_u64(def.returns as u64);
    writer.write_u64(def.stack_arity as u64);
    writer.write_u64(def.locals_count as u64);

    writer.write_sized(|writer| write_list(writer, &def.code, write_instruction));

    writer.write_sized(|writer| {
        if settings.store_debug_symbols {
            match &def.debug_symbol {
                Some(symbol) => {
                    writer.write_u8(1);
                    write_function_debug_symbol(writer, symbol);
                }
                None => writer.write_u8(0),
            }
            write_list(writer, &def.code_debug_symbols, write_block_debug_symbol);
        }
    });
}

fn write_global_definition(writer: &mut ByteWriter, def: &GlobalDefinition, settings: &WriteSettings) {
    write_string(writer, def.name.as_bytes());
    writer.write_u8(if def.is_constant { GLOBAL_FLAG_CONSTANT } else { 0 });
    write_value(writer, &def.initial_value, settings);

    writer.write_sized(|writer| {
        if settings.store_debug_symbols {
            if let Some(token) = &def.debug_symbol {
                write_token(writer, token);
            }
        }
    });
}

fn write_source_debug_symbol(writer: &mut ByteWriter, symbol: &SourceDebugSymbol) {
    write_string(writer, symbol.path.as_bytes());
    write_string(writer, symbol.source_text.as_bytes());
}

fn write_module(writer: &mut ByteWriter, module: &Module, settings: &WriteSettings) {
    writer.write_sized(|writer| {
        if !module.functions.is_empty() {
            writer.write_u8(CHUNK_FUNCTIONS);
            writer.write_sized(|writer| write_list(writer, &module.functions, |w, f| write_function_definition(w, f, settings)));
        }
        if !module.native_bindings.is_empty() {
            writer.write_u8(CHUNK_NATIVE_BINDINGS);
            writer.write_sized(|writer| write_list(writer, &module.native_bindings, |w, f| write_function_definition(w, f, settings)));
        }
        if !module.globals.is_empty() {
            writer.write_u8(CHUNK_GLOBALS);
            writer.write_sized(|writer| write_list(writer, &module.globals, |w, g| write_global_definition(w, g, settings)));
        }
        if !module.constants.is_empty() {
            writer.write_u8(CHUNK_CONSTANTS);
            writer.write_sized(|writer| write_list(writer, &module.constants, |w, v| write_value(w, v, settings)));
        }
        if settings.store_debug_symbols && !module.source_debug_symbols.is_empty() {
            writer.write_u8(CHUNK_SOURCE_DEBUG_SYMBOLS);
            writer.write_sized(|writer| write_list(writer, &module.source_debug_symbols, write_source_debug_symbol));
        }

        writer.write_u8(CHUNK_END_OF_MODULE);
        writer.write_u64(0);
    });
}
