fn main() {
    if let Err(err) = csv_seeder::run() {
        if !err.is::<csv_seeder::error::AlreadyReported>() {
            eprintln!("error: {err:#}");
        }
        std::process::exit(1);
    }
}
