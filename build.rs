use std::env;
use std::process::Command;

/// Trimmed stdout of a successful command, else "unknown".
fn probe(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    for path in [
        "build.rs",
        "data/skipper-entrypoint.sh",
        "data/skipper-complete.sh",
    ] {
        println!("cargo:rerun-if-changed={path}");
    }

    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let stamps = [
        ("SKIPPER_BUILD_DATE", probe("date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"])),
        (
            "SKIPPER_BUILD_TARGET",
            env::var("TARGET").unwrap_or_else(|_| "unknown".to_string()),
        ),
        ("SKIPPER_BUILD_RUSTC", probe(&rustc, &["--version"])),
    ];
    for (key, value) in stamps {
        println!("cargo:rustc-env={key}={value}");
    }
}
