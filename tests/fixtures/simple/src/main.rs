use std::thread;

fn hello() {
    println!("hello");
}

fn goodbye() {
    println!("goodbye");
}

fn worker() {
    hello();
}

fn main() {
    hello();
    goodbye();
    let handle = thread::spawn(worker);
    let _ = handle.join();
}
