//! Integration tests for the kernel host runtime

use kernel_host::{HostError, HostOptions, HostOutput, HostRuntime};
use std::io::Write;

fn run(args: &[&str]) -> Result<HostOutput, HostError> {
    HostRuntime::new(HostOptions::parse(args)?)?.run()
}

#[test]
fn test_demo_with_every_combination() {
    for allocator in ["bitmap", "buddy"] {
        for scheduler in ["round_robin", "priority"] {
            for ipc in ["message_queue", "shared_memory"] {
                let output = run(&[
                    "--allocator", allocator, "--scheduler", scheduler, "--ipc", ipc, "--ticks", "60",
                ])
                .unwrap();
                let HostOutput::Demo(report) = output else {
                    panic!("expected a demo report");
                };
                assert_eq!(report.ticks, 60);
                assert_eq!(report.messages_received, 6, "{allocator}/{scheduler}/{ipc}");
            }
        }
    }
}

#[test]
fn test_config_file_with_flag_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "components": {{ "allocator": "buddy", "scheduler": "priority", "transport": "message_queue" }},
            "memory": {{ "start": 1048576, "end": 2097152 }}
        }}"#
    )
    .unwrap();
    let path = file.path().to_str().unwrap();

    let options = HostOptions::parse(&["--ipc", "sh", "--config", path]).unwrap();
    let runtime = HostRuntime::new(options).unwrap();
    let config = runtime.config();
    assert_eq!(config.components.allocator, "buddy");
    assert_eq!(config.components.transport, "sh");
    assert_eq!(config.memory.end - config.memory.start, 0x10_0000);

    assert!(matches!(runtime.run().unwrap(), HostOutput::Demo(_)));
}

#[test]
fn test_compare_prints_json_for_each_category() {
    for (flag, tag) in [
        ("allocator", "physical_allocator"),
        ("scheduler", "scheduler"),
        ("ipc", "ipc_transport"),
    ] {
        let HostOutput::Comparison(json) = run(&["--compare", flag, "--ticks", "120"]).unwrap()
        else {
            panic!("expected a comparison for {flag}");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["category"], tag);
        assert_eq!(value["results"].as_array().map(Vec::len), Some(2), "{flag}");
    }
}

#[test]
fn test_bad_config_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "round_robin_quantum": 0 }}"#).unwrap();
    let path = file.path().to_str().unwrap();

    let err = run(&["--config", path]).unwrap_err();
    assert!(matches!(err, HostError::Config(_)), "{err}");
    assert!(!err.is_usage());

    let err = run(&["--scheduler", "lottery"]).unwrap_err();
    assert!(err.to_string().contains("Configuration error"), "{err}");
}
