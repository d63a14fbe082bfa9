pub mod assemble_ortho;
pub mod create;
pub mod cut_opi;
pub mod opis;
pub mod prep_cut;
pub mod rasterize_graph;

mod window;
pub use window::WindowArg;
