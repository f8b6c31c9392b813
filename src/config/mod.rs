pub mod exposure_config;

pub use self::exposure_config::{
    ExposureSetting, Setting, SimulationSetting, MAX_GRID_DIMENSION, MIN_GRID_DIMENSION,
};
