fn main() {
    #[cfg(feature = "cli")]
    chunkdelta::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("chunkdelta: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
