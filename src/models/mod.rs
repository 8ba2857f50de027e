pub mod classification;
pub mod incident;
pub mod plan;
pub mod recommendation;
pub mod run;

pub use classification::*;
pub use incident::*;
pub use plan::*;
pub use recommendation::*;
pub use run::*;
