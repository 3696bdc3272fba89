pub mod c3d;

pub use c3d::{C3dFile, C3dFrame, C3dHeader, C3dPoint, ParameterRecord, ParameterSection};
