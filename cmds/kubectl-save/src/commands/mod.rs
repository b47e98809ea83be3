pub mod save;

pub mod util;
