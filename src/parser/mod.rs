pub mod blocks;
pub mod sections;
pub mod text;
