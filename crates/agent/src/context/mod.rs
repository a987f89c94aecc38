//! Context assembly: headers, decaying observations, auto-retrieval and a
//! token-bounded window of recent turns.

pub mod assembler;

pub use assembler::{
    AssembledContext, AssemblyMetadata, ContextAssembler, RETRIEVAL_NAME, RETRIEVAL_PREAMBLE,
};
