mod utils;

mod boundary;
mod buffering;
mod read_good;
mod reordering;

#[cfg(feature = "async-tokio")]
mod async_io;
