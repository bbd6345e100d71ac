pub mod disasm;
pub mod run;
