//! Prints a random `SECRET_KEY` for signing session cookies.

fn main() {
    let bytes: [u8; 32] = rand::random();
    let secret: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    println!("SECRET_KEY={secret}");
}
