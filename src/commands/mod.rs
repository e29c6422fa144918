pub mod kill;
pub mod status;
pub mod stop;
