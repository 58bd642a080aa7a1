#[cfg(test)]
mod scenario_files {
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    use pacesim::scenario::{
        apply_overrides, load_config, CliOverrides, ScenarioDriver, ScenarioReport,
    };

    const SCENARIO: &str = r#"
general:
  stop_time: "10s"
  log_level: debug
  seed: 99
network:
  base: "192.168.0.0"
  mask: "255.255.255.0"
flows:
  - name: tcp
    kind: tcp
    packet_size: 1040
    packet_budget: 100
    rate: "2Mbps"
    start: "1s"
    stop: "5s"
  - name: udp
    kind: udp
    sink: "192.168.0.20:8081"
    packet_size: 512
    rate: "512kbps"
    start: "2s"
    rate_change:
      at: "3s"
      rate: "1Mbps"
"#;

    fn scenario_file(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", yaml).unwrap();
        file
    }

    /// Load a scenario from disk, run it and write both outputs.
    #[test]
    fn test_scenario_file_end_to_end() {
        let file = scenario_file(SCENARIO);
        let mut config = load_config(file.path()).unwrap();
        apply_overrides(
            &mut config,
            &CliOverrides {
                stop_time: None,
                trace: Some(true),
            },
        )
        .unwrap();

        let outcome = ScenarioDriver::new("two-flows", config).run().unwrap();
        let output = tempdir().unwrap();
        let report_path = output.path().join("report.json");
        let trace_path = output.path().join("packets.tr");

        outcome.report.write_json(&report_path).unwrap();
        outcome.trace.as_ref().unwrap().write_to(&trace_path).unwrap();

        let report: ScenarioReport =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report.scenario, "two-flows");
        assert_eq!(report.stop_time_s, 10.0);

        let tcp = report.flow("tcp").unwrap();
        assert_eq!(tcp.sink, "192.168.0.1:8080");
        assert_eq!(tcp.packets_sent, 100);
        assert_eq!(tcp.stopped_at_s, Some(5.0));

        let udp = report.flow("udp").unwrap();
        assert_eq!(udp.sink, "192.168.0.20:8081");
        assert_eq!(udp.final_rate, "1Mbps");
        assert_eq!(udp.packet_budget, 0);
        assert!(udp.sink_rx_packets > 0);
        assert_eq!(udp.stopped_at_s, Some(10.0));

        let trace = std::fs::read_to_string(&trace_path).unwrap();
        let mut lines = trace.lines();
        assert_eq!(lines.next(), Some("# time\tflow\tevent\tbytes"));
        assert_eq!(lines.next(), Some("1.000000000\ttcp\tstart\t0"));
        assert_eq!(lines.next(), Some("1.000000000\ttcp\ttx\t1040"));
        for line in lines {
            assert_eq!(line.split('\t').count(), 4, "malformed trace line: {}", line);
        }
    }

    #[test]
    fn test_stop_time_override_shortens_run() {
        let file = scenario_file(SCENARIO);
        let mut config = load_config(file.path()).unwrap();
        apply_overrides(
            &mut config,
            &CliOverrides {
                stop_time: Some("1500ms".to_string()),
                trace: None,
            },
        )
        .unwrap();

        let outcome = ScenarioDriver::new("short", config).run().unwrap();
        assert!(outcome.trace.is_none());

        let udp = outcome.report.flow("udp").unwrap();
        assert_eq!(udp.packets_sent, 0);
        assert_eq!(udp.started_at_s, None);

        // 4.16 ms gap from 1 s: the 100th send lands at 1.41184 s.
        let tcp = outcome.report.flow("tcp").unwrap();
        assert_eq!(tcp.packets_sent, 100);
        assert_eq!(tcp.stopped_at_s, Some(1.5));
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let duplicate_names = SCENARIO.replace("name: udp", "name: tcp");
        assert!(load_config(scenario_file(&duplicate_names).path()).is_err());

        let bad_rate = SCENARIO.replace("\"512kbps\"", "\"fast\"");
        assert!(load_config(scenario_file(&bad_rate).path()).is_err());

        let bad_network = SCENARIO.replace("255.255.255.0", "255.255.255.255");
        assert!(load_config(scenario_file(&bad_network).path()).is_err());

        let not_yaml = "general: [unclosed";
        assert!(load_config(scenario_file(not_yaml).path()).is_err());
    }
}
