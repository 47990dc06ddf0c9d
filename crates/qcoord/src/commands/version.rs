//! Version command.

pub fn run() {
    println!("qcoord {}", env!("CARGO_PKG_VERSION"));
}
