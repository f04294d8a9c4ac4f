pub mod batdongsan;
pub mod browser;
pub mod pagination;
pub mod pool;
pub mod traits;
pub mod types;

pub use browser::ChromeLauncher;
