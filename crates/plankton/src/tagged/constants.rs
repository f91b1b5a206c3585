//! Tag bytes of the self-describing encoding.

pub const INT_0: u8 = 0x00;
pub const INT_5: u8 = 0x05;
pub const INT_P: u8 = 0x08;
pub const INT_M: u8 = 0x09;
pub const INT_M3: u8 = 0x0d;
pub const INT_M2: u8 = 0x0e;
pub const INT_M1: u8 = 0x0f;

pub const NULL: u8 = 0x10;
pub const TRUE: u8 = 0x11;
pub const FALSE: u8 = 0x12;

pub const ID_16: u8 = 0x14;
pub const ID_32: u8 = 0x15;
pub const ID_64: u8 = 0x16;
pub const ID_128: u8 = 0x17;

pub const FLOAT_32: u8 = 0x1a;
pub const FLOAT_64: u8 = 0x1b;

pub const ARRAY_0: u8 = 0x20;
pub const ARRAY_3: u8 = 0x23;
pub const ARRAY_N: u8 = 0x28;

pub const MAP_0: u8 = 0x30;
pub const MAP_3: u8 = 0x33;
pub const MAP_N: u8 = 0x38;

pub const BLOB_N: u8 = 0x48;

pub const STRING_0: u8 = 0x50;
pub const STRING_7: u8 = 0x57;
pub const STRING_N: u8 = 0x58;

pub const SEED_0: u8 = 0x60;
pub const SEED_3: u8 = 0x63;
pub const SEED_N: u8 = 0x68;

pub const STRUCT_0: u8 = 0x80;
pub const STRUCT_7: u8 = 0x87;
pub const STRUCT_N: u8 = 0x88;

pub const ADD_REF: u8 = 0xa0;
pub const GET_REF: u8 = 0xa1;
