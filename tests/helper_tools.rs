//! Drives the espeak-ng and sox wrappers against stand-in shell scripts.
//!
//! One test per binary so no other test thread forks while the scripts
//! are being written.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use pbx_tts_server::audio::{samples_to_wav, Resampled, Resampler};
use pbx_tts_server::tts::kokoro::tokenizer::phonemize;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn leftover_temp_files() -> usize {
    std::fs::read_dir(std::env::temp_dir())
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.file_name().to_string_lossy().starts_with("pbx-tts-"))
                .count()
        })
        .unwrap_or(0)
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn espeak_and_sox_invocations() {
    let work = TempDir::new().unwrap();
    let args_copy = work.path().join("args.txt");
    let stdin_copy = work.path().join("stdin.txt");

    let espeak = script(
        work.path(),
        "espeak-ng",
        &format!(
            r#"printf '%s\n' "$@" > "{args}"
cat > "{stdin}"
printf 'həlˈoʊ\nwˈɜːld\n'"#,
            args = args_copy.display(),
            stdin = stdin_copy.display(),
        ),
    );

    // Leading dash is text, not an option
    let phonemes = phonemize(&espeak, "-w/tmp/x.wav", "en-gb").unwrap();
    assert_eq!(phonemes, "həlˈoʊ wˈɜːld");
    assert_eq!(lines(&args_copy), vec!["--ipa", "-q", "--stdin", "-v", "en-gb"]);
    assert_eq!(std::fs::read_to_string(&stdin_copy).unwrap(), "-w/tmp/x.wav");

    // Far beyond the argument list limit
    let long_text = "word ".repeat(40_000);
    let phonemes = phonemize(&espeak, &long_text, "en-us").unwrap();
    assert_eq!(phonemes, "həlˈoʊ wˈɜːld");
    assert_eq!(std::fs::read(&stdin_copy).unwrap().len(), long_text.len());
    assert_eq!(lines(&args_copy).len(), 5);

    let fixture = work.path().join("fixture.wav");
    let converted = samples_to_wav(&vec![0.1f32; 800], 8000).unwrap();
    std::fs::write(&fixture, &converted).unwrap();
    let original = samples_to_wav(&vec![0.1f32; 2205], 22050).unwrap();

    let sox = script(
        work.path(),
        "sox",
        &format!(
            r#"printf '%s\n' "$@" > "{args}"
cp "{fixture}" "$6""#,
            args = args_copy.display(),
            fixture = fixture.display(),
        ),
    );
    let empty_sox = script(work.path(), "sox-empty", r#": > "$6""#);
    let slow_sox = script(work.path(), "sox-slow", "sleep 5");

    let before = leftover_temp_files();

    // Converted bytes come back as processed, argument order is fixed
    let resampler = Resampler::new(sox, Duration::from_secs(10));
    let result = resampler.to_telephony(original.clone()).await;
    assert_eq!(result, Resampled::Processed(converted));
    let argv = lines(&args_copy);
    assert_eq!(argv.len(), 6);
    assert_eq!(&argv[1..5], ["-r", "8000", "-c", "1"]);
    for file in [&argv[0], &argv[5]] {
        let name = Path::new(file).file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("pbx-tts-") && name.ends_with(".wav"));
        assert!(!Path::new(file).exists());
    }

    // Empty output is not a conversion
    let resampler = Resampler::new(empty_sox, Duration::from_secs(10));
    let result = resampler.to_telephony(original.clone()).await;
    assert_eq!(result, Resampled::Passthrough(original.clone()));

    // Running past the budget hands back the input
    let resampler = Resampler::new(slow_sox, Duration::from_millis(300));
    let started = Instant::now();
    let result = resampler.to_telephony(original.clone()).await;
    assert_eq!(result, Resampled::Passthrough(original));
    assert!(started.elapsed() < Duration::from_secs(4));

    assert_eq!(leftover_temp_files(), before);
}
