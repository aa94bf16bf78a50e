use screenstate_config::load_toml;
use rstest::rstest;

#[rstest]
#[case::zero_capture_timeout("[device]\ncapture_timeout_ms = 0\n", "capture_timeout_ms must be >= 1")]
#[case::zero_command_timeout("[device]\ncommand_timeout_ms = 0\n", "command_timeout_ms must be >= 1")]
#[case::empty_adb_path("[device]\nadb_path = \"  \"\n", "adb_path must not be empty")]
#[case::ratio_zero("[classifier]\nmin_ratio = 0.0\n", "min_ratio must be in (0.0, 1.0]")]
#[case::ratio_above_one("[classifier]\nmin_ratio = 1.5\n", "min_ratio must be in (0.0, 1.0]")]
#[case::no_attempts(
    "[wait]\nmax_pre_attempts = 0\nmax_post_attempts = 0\n",
    "must be >= 1"
)]
#[case::no_pre_attempts(
    "[wait]\nmax_pre_attempts = 0\nmax_post_attempts = 10\n",
    "max_pre_attempts must be >= 1"
)]
#[case::huge_interval("[wait]\npoll_interval_ms = 3600000\n", "unreasonably large")]
#[case::inverted_zone("[progress]\nzone = [10, 10, 5, 20]\n", "x1 < x2")]
#[case::bad_rotation("[logging]\nrotation = \"weekly\"\n", "never|daily|hourly")]
#[case::empty_launch(
    "[[action]]\nwhen = \"unknown\"\nname = \"relaunch\"\nsteps = [{ launch = \"\" }]\n",
    "needs a package id"
)]
#[case::empty_when("[[action]]\nwhen = \"\"\nname = \"x\"\n", "when must not be empty")]
fn rejects_invalid_sections(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error '{err}' does not mention '{needle}'"
    );
}

#[test]
fn accepts_full_config() {
    let toml = r#"
[device]
serial = "emulator-5554"
adb_path = "/opt/platform-tools/adb"
capture_timeout_ms = 5000
command_timeout_ms = 3000

[classifier]
min_ratio = 0.8

[wait]
max_pre_attempts = 3
max_post_attempts = 5
poll_interval_ms = 500

[store]
path = "data/signatures.toml"

[progress]
zone = [400, 1800, 700, 1860]

[logging]
file = "screenstate.log"
level = "debug"
rotation = "daily"

[[action]]
when = "not_foreground"
name = "relaunch"
steps = [{ launch = "com.lilithgame.roc.gp" }]

[[action]]
when = "any"
name = "back"
steps = [{ key = 4 }]
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.device.serial.as_deref(), Some("emulator-5554"));
    assert_eq!(cfg.actions.len(), 2);
    let progress = cfg.progress.expect("progress section");
    assert_eq!(progress.tesseract_path, "tesseract");
    assert_eq!(progress.text_threshold, 180);
}

#[test]
fn unknown_step_kind_is_a_parse_error() {
    let toml = "[[action]]\nwhen = \"x\"\nname = \"y\"\nsteps = [{ pinch = 3 }]\n";
    assert!(load_toml(toml).is_err());
}
