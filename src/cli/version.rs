/// Display version information
pub fn execute() {
    println!("wagate {}", env!("CARGO_PKG_VERSION"));
    println!("Operator CLI for the Wagate WhatsApp gateway");
}
