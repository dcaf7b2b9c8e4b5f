//! Wire-tag tables for `Opcode`, `TokenType`, and the `Value` variant tag.
//!
//! None of these enums carry explicit discriminants (`Opcode`/`TokenType` are
//! matched by name elsewhere, via `strum`/`Display`), so the wire encoding is
//! an explicit table here rather than a cast. Order matches each enum's
//! declaration in `module.rs`/`token.rs`/`value.rs`.

use crate::module::Opcode;
use crate::token::TokenType;

use super::error::{ReadError, ReadOutcome};

pub fn opcode_to_u8(opcode: Opcode) -> u8 {
    match opcode {
        Opcode::PushInt => 0,
        Opcode::PushDbl => 1,
        Opcode::PushConst => 2,
        Opcode::PushLocal => 3,
        Opcode::MoveLocal => 4,
        Opcode::PopIntoLocal => 5,
        Opcode::CopyIntoLocal => 6,
        Opcode::PushGlobal => 7,
        Opcode::MoveGlobal => 8,
        Opcode::PopIntoGlobal => 9,
        Opcode::CopyIntoGlobal => 10,
        Opcode::PushEmptyList => 11,
        Opcode::PushFunctionReference => 12,
        Opcode::PushNativeFunctionReference => 13,
        Opcode::Call => 14,
        Opcode::CallNative => 15,
        Opcode::ICall => 16,
        Opcode::Return => 17,
        Opcode::DynSum => 18,
        Opcode::DynSub => 19,
        Opcode::DynMul => 20,
        Opcode::DynDiv => 21,
        Opcode::Mod => 22,
        Opcode::BitAnd => 23,
        Opcode::BitOr => 24,
        Opcode::BitXor => 25,
        Opcode::BitNot => 26,
        Opcode::BitShiftLeft => 27,
        Opcode::BitShiftRight => 28,
        Opcode::Floor => 29,
        Opcode::Ceil => 30,
        Opcode::Compare => 31,
        Opcode::Jump => 32,
        Opcode::JumpIfZero => 33,
        Opcode::JumpIfNotZero => 34,
        Opcode::JumpIfGt => 35,
        Opcode::JumpIfGe => 36,
        Opcode::JumpIfLt => 37,
        Opcode::JumpIfLe => 38,
        Opcode::Length => 39,
        Opcode::IsEmpty => 40,
        Opcode::Prepend => 41,
        Opcode::Append => 42,
        Opcode::Concat => 43,
        Opcode::Head => 44,
        Opcode::Tail => 45,
        Opcode::Index => 46,
        Opcode::Prefix => 47,
        Opcode::Suffix => 48,
        Opcode::Substr => 49,
    }
}

pub fn u8_to_opcode(byte: u8) -> ReadOutcome<Opcode> {
    Ok(match byte {
        0 => Opcode::PushInt,
        1 => Opcode::PushDbl,
        2 => Opcode::PushConst,
        3 => Opcode::PushLocal,
        4 => Opcode::MoveLocal,
        5 => Opcode::PopIntoLocal,
        6 => Opcode::CopyIntoLocal,
        7 => Opcode::PushGlobal,
        8 => Opcode::MoveGlobal,
        9 => Opcode::PopIntoGlobal,
        10 => Opcode::CopyIntoGlobal,
        11 => Opcode::PushEmptyList,
        12 => Opcode::PushFunctionReference,
        13 => Opcode::PushNativeFunctionReference,
        14 => Opcode::Call,
        15 => Opcode::CallNative,
        16 => Opcode::ICall,
        17 => Opcode::Return,
        18 => Opcode::DynSum,
        19 => Opcode::DynSub,
        20 => Opcode::DynMul,
        21 => Opcode::DynDiv,
        22 => Opcode::Mod,
        23 => Opcode::BitAnd,
        24 => Opcode::BitOr,
        25 => Opcode::BitXor,
        26 => Opcode::BitNot,
        27 => Opcode::BitShiftLeft,
        28 => Opcode::BitShiftRight,
        29 => Opcode::Floor,
        30 => Opcode::Ceil,
        31 => Opcode::Compare,
        32 => Opcode::Jump,
        33 => Opcode::JumpIfZero,
        34 => Opcode::JumpIfNotZero,
        35 => Opcode::JumpIfGt,
        36 => Opcode::JumpIfGe,
        37 => Opcode::JumpIfLt,
        38 => Opcode::JumpIfLe,
        39 => Opcode::Length,
        40 => Opcode::IsEmpty,
        41 => Opcode::Prepend,
        42 => Opcode::Append,
        43 => Opcode::Concat,
        44 => Opcode::Head,
        45 => Opcode::Tail,
        46 => Opcode::Index,
        47 => Opcode::Prefix,
        48 => Opcode::Suffix,
        49 => Opcode::Substr,
        _ => return Err(ReadError::UnsupportedValueType),
    })
}

pub fn token_type_to_u16(token_type: TokenType) -> u16 {
    match token_type {
        TokenType::None => 0,
        TokenType::EndOfFile => 1,
        TokenType::Identifier => 2,
        TokenType::OpenParenth => 3,
        TokenType::CloseParenth => 4,
        TokenType::OpenBracket => 5,
        TokenType::CloseBracket => 6,
        TokenType::IntegerLiteral => 7,
        TokenType::DoubleLiteral => 8,
        TokenType::StringLiteral => 9,
        TokenType::Plus => 10,
        TokenType::Minus => 11,
        TokenType::Star => 12,
        TokenType::Slash => 13,
        TokenType::Modulus => 14,
        TokenType::BitAnd => 15,
        TokenType::BitOr => 16,
        TokenType::BitNot => 17,
        TokenType::BitXor => 18,
        TokenType::BitShiftLeft => 19,
        TokenType::BitShiftRight => 20,
        TokenType::FullStop => 21,
        TokenType::Bang => 22,
        TokenType::Colon => 23,
        TokenType::Comma => 24,
        TokenType::RightArrow => 25,
        TokenType::LeftArrow => 26,
        TokenType::BothArrows => 27,
        TokenType::Equals => 28,
        TokenType::NotEquals => 29,
        TokenType::Less => 30,
        TokenType::LessOrEqual => 31,
        TokenType::More => 32,
        TokenType::MoreOrEqual => 33,
        TokenType::PushReference => 34,
        TokenType::KwNot => 35,
        TokenType::KwIf => 36,
        TokenType::KwElse => 37,
        TokenType::KwEnd => 38,
        TokenType::KwGlobal => 39,
        TokenType::KwConst => 40,
        TokenType::KwDo => 41,
        TokenType::KwWhile => 42,
        TokenType::KwBreak => 43,
        TokenType::KwContinue => 44,
        TokenType::KwLocal => 45,
        TokenType::CompilerDirective => 46,
        TokenType::Label => 47,
    }
}

pub fn u16_to_token_type(code: u16) -> TokenType {
    match code {
        1 => TokenType::EndOfFile,
        2 => TokenType::Identifier,
        3 => TokenType::OpenParenth,
        4 => TokenType::CloseParenth,
        5 => TokenType::OpenBracket,
        6 => TokenType::CloseBracket,
        7 => TokenType::IntegerLiteral,
        8 => TokenType::DoubleLiteral,
        9 => TokenType::StringLiteral,
        10 => TokenType::Plus,
        11 => TokenType::Minus,
        12 => TokenType::Star,
        13 => TokenType::Slash,
        14 => TokenType::Modulus,
        15 => TokenType::BitAnd,
        16 => TokenType::BitOr,
        17 => TokenType::BitNot,
        18 => TokenType::BitXor,
        19 => TokenType::BitShiftLeft,
        20 => TokenType::BitShiftRight,
        21 => TokenType::FullStop,
        22 => TokenType::Bang,
        23 => TokenType::Colon,
        24 => TokenType::Comma,
        25 => TokenType::RightArrow,
        26 => TokenType::LeftArrow,
        27 => TokenType::BothArrows,
        28 => TokenType::Equals,
        29 => TokenType::NotEquals,
        30 => TokenType::Less,
        31 => TokenType::LessOrEqual,
        32 => TokenType::More,
        33 => TokenType::MoreOrEqual,
        34 => TokenType::PushReference,
        35 => TokenType::KwNot,
        36 => TokenType::KwIf,
        37 => TokenType::KwElse,
        38 => TokenType::KwEnd,
        39 => TokenType::KwGlobal,
        40 => TokenType::KwConst,
        41 => TokenType::KwDo,
        42 => TokenType::KwWhile,
        43 => TokenType::KwBreak,
        44 => TokenType::KwContinue,
        45 => TokenType::KwLocal,
        46 => TokenType::CompilerDirective,
        47 => TokenType::Label,
        _ => TokenType::None,
    }
}

pub const VALUE_TAG_VOID: u8 = 0;
pub const VALUE_TAG_INTEGER: u8 = 1;
pub const VALUE_TAG_DOUBLE: u8 = 2;
pub const VALUE_TAG_FUNCTION_REFERENCE: u8 = 3;
pub const VALUE_TAG_NATIVE_FUNCTION_REFERENCE: u8 = 4;
pub const VALUE_TAG_LIST: u8 = 5;
pub const VALUE_TAG_STRING: u8 = 6;
pub const VALUE_TAG_CUSTOM: u8 = 7;
