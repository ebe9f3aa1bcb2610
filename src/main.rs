use jellyfin_desktop::app::{App, Options};

const USAGE: &str = "\
Usage: jellyfin-desktop [options]

Options:
  -h, --help       Show this help message
  --video <file>   Load video file on startup
  --gpu-overlay    Enable GPU overlay (shared-texture fast path)
";

fn main() {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print!("{USAGE}");
                return;
            }
            "--video" => match args.next() {
                Some(path) => options.test_video = Some(path),
                None => {
                    eprintln!("--video requires a path");
                    std::process::exit(2);
                }
            },
            "--gpu-overlay" => options.gpu_overlay = true,
            other => {
                eprintln!("unknown option: {other}");
                eprint!("{USAGE}");
                std::process::exit(2);
            }
        }
    }

    if let Err(e) = App::run(options) {
        eprintln!("jellyfin-desktop: {e}");
        let _ = std::fs::write("jellyfin_desktop_error.log", format!("{e:?}"));
        std::process::exit(1);
    }
}
