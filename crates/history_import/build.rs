use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_COMMIT_HASH");
    for head in [".git/HEAD", "../.git/HEAD", "../../.git/HEAD"] {
        println!("cargo:rerun-if-changed={head}");
    }

    // CI images are built without `.git`, so they pass the hash in explicitly.
    let commit = std::env::var("SOURCE_COMMIT_HASH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(git_head)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=HISTORY_IMPORT_GIT_COMMIT_HASH={commit}");
}

fn git_head() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;

    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|hash| !hash.is_empty())
}
