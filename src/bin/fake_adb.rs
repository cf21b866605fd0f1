//! Fake adb binary for integration testing
//!
//! Understands the subset of `adb shell` / `adb exec-out` commands the adb
//! backend issues and answers them from an in-memory device. The device
//! state is loaded from and saved back to the JSON file named by
//! `FAKE_ADB_STATE`, so consecutive invocations see one device. Without
//! that variable every invocation starts from a fresh demo device.

use std::path::{Path, PathBuf};

use uidriver::device::dump::render_dump;
use uidriver::device::fake::FakeState;

const STATE_ENV: &str = "FAKE_ADB_STATE";

fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    // Serial selection is accepted and ignored: there is only one device
    if args.first().map(String::as_str) == Some("-s") {
        args.drain(..2.min(args.len()));
    }

    let state_path = std::env::var_os(STATE_ENV).map(PathBuf::from);
    let mut state = match &state_path {
        Some(path) if path.exists() => match load_state(path) {
            Ok(state) => state,
            Err(e) => fail(&format!("cannot load {}: {}", path.display(), e)),
        },
        _ => FakeState::with_demo_app(),
    };

    let (transport, command) = match args.split_first() {
        Some((t, rest)) if t == "shell" || t == "exec-out" => (t.as_str(), rest),
        Some((t, _)) => fail(&format!("unknown command {}", t)),
        None => fail("no command"),
    };

    let words: Vec<&str> = command.iter().map(String::as_str).collect();
    match run(&mut state, &words) {
        Ok(output) => print!("{}", output),
        Err(message) => fail(&format!("{} {}: {}", transport, words.join(" "), message)),
    }

    if let Some(path) = &state_path {
        if let Err(e) = save_state(path, &state) {
            fail(&format!("cannot save {}: {}", path.display(), e));
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("adb: error: {}", message);
    std::process::exit(1);
}

fn load_state(path: &Path) -> Result<FakeState, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

fn save_state(path: &Path, state: &FakeState) -> Result<(), String> {
    let content = serde_json::to_string(state).map_err(|e| e.to_string())?;
    std::fs::write(path, content).map_err(|e| e.to_string())
}

/// Execute one device command and return its stdout
fn run(state: &mut FakeState, words: &[&str]) -> Result<String, String> {
    match words {
        ["input", "keyevent", codes @ ..] if !codes.is_empty() => {
            for code in codes {
                keyevent(state, code)?;
            }
            Ok(String::new())
        }

        ["input", "tap", x, y] => {
            let x: i32 = x.parse().map_err(|_| format!("bad x '{}'", x))?;
            let y: i32 = y.parse().map_err(|_| format!("bad y '{}'", y))?;
            state.tap(x, y).map_err(|e| e.to_string())?;
            Ok(String::new())
        }

        ["input", "text", text] => {
            state.type_text(&unescape_input_text(text));
            Ok(String::new())
        }

        ["monkey", "-p", package, ..] => match state.launch(package) {
            Ok(()) => Ok("Events injected: 1\n".to_string()),
            // monkey reports a missing package on stdout and still exits 0
            Err(_) => Ok("** No activities found to run, monkey aborted.\n".to_string()),
        },

        ["am", "force-stop", package] => {
            state.force_stop(package);
            Ok(String::new())
        }

        ["cmd", "package", "resolve-activity", ..] => Ok(format!(
            "priority=0 preferredOrder=0 match=0x108000 specificIndex=-1 isDefault=true\n{}/.Launcher\n",
            state.launcher()
        )),

        ["uiautomator", "dump", "/dev/tty"] => {
            let tree = state.snapshot();
            Ok(format!(
                "{}UI hierchary dumped to: /dev/tty\n",
                render_dump(&tree)
            ))
        }

        _ => Err("unsupported command".to_string()),
    }
}

fn keyevent(state: &mut FakeState, code: &str) -> Result<(), String> {
    match code {
        "KEYCODE_HOME" | "3" => state.press_home(),
        "KEYCODE_BACK" | "4" => state.back(),
        "KEYCODE_DEL" | "67" => state.delete_char(),
        // The cursor of a fake text field is always at the end
        "KEYCODE_MOVE_END" | "123" => {}
        other => return Err(format!("unsupported key code {}", other)),
    }
    Ok(())
}

/// Decode an `input text` argument
///
/// The device shell strips backslashes first, then `input` turns every
/// `%s` into a space.
fn unescape_input_text(text: &str) -> String {
    let mut unquoted = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    unquoted.push(next);
                }
            }
            c => unquoted.push(c),
        }
    }
    unquoted.replace("%s", " ")
}
