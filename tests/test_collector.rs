use ha_cluster_exporter::collector::corosync::CorosyncCollector;
use ha_cluster_exporter::collector::drbd::DrbdCollector;
use ha_cluster_exporter::collector::pacemaker::PacemakerCollector;
use ha_cluster_exporter::collector::sbd::SbdCollector;
use ha_cluster_exporter::collector::*;
use ha_cluster_exporter::exposition;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Helper function to get the absolute path of a fixture file
    fn fixture(name: &str) -> String {
        format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    /// Helper function to write an executable shell script standing in for a cluster tool
    fn fake_tool(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Helper function to find the first metric with the given name and labels
    fn find<'a>(metrics: &'a [Metric], name: &str, labels: &[(&str, &str)]) -> Option<&'a Metric> {
        metrics
            .iter()
            .find(|m| m.name() == name && labels.iter().all(|(k, v)| m.label(k) == Some(*v)))
    }

    #[test]
    fn test_corosync_collector() {
        let dir = TempDir::new().unwrap();
        // a faulty ring makes cfgtool exit with 1
        let cfgtool = fake_tool(
            &dir,
            "corosync-cfgtool",
            &format!("cat {}\nexit 1", fixture("corosync_cfgtool.txt")),
        );
        let quorumtool = fake_tool(
            &dir,
            "corosync-quorumtool",
            &format!("cat {}", fixture("corosync_quorumtool.txt")),
        );

        let collector = CorosyncCollector::new(&cfgtool, &quorumtool).unwrap();
        let metrics = collector.collect().unwrap();

        let healthy = find(&metrics, "rings", &[("number", "0")]).unwrap();
        assert_eq!(healthy.value, 1.0);
        assert_eq!(healthy.label("ring_id"), Some("1084780051/44"));
        assert_eq!(healthy.label("node_id"), Some("1084780051"));
        assert_eq!(healthy.label("address"), Some("192.168.125.15"));

        let faulty = find(&metrics, "rings", &[("number", "1")]).unwrap();
        assert_eq!(faulty.value, 0.0);

        assert_eq!(find(&metrics, "ring_errors", &[]).unwrap().value, 1.0);
        assert_eq!(find(&metrics, "quorate", &[]).unwrap().value, 1.0);
        assert_eq!(
            find(&metrics, "quorum_votes", &[("type", "quorum")]).unwrap().value,
            1.0
        );

        let local = find(&metrics, "member_votes", &[("node", "hana01")]).unwrap();
        assert_eq!(local.label("local"), Some("true"));
        let remote = find(&metrics, "member_votes", &[("node", "hana02")]).unwrap();
        assert_eq!(remote.label("local"), Some("false"));
    }

    #[test]
    fn test_corosync_collector_unparseable_output() {
        let dir = TempDir::new().unwrap();
        let cfgtool = fake_tool(&dir, "corosync-cfgtool", "echo 'Could not initialize corosync configuration API'\nexit 1");
        let quorumtool = fake_tool(&dir, "corosync-quorumtool", "echo 'Cannot initialize QUORUM service'\nexit 1");

        let collector = CorosyncCollector::new(&cfgtool, &quorumtool).unwrap();
        let err = collector.collect().unwrap_err();

        assert_eq!(
            err.to_string(),
            "corosync parser error: could not find NodeId in command output"
        );
    }

    #[test]
    fn test_pacemaker_collector() {
        let dir = TempDir::new().unwrap();
        let crm_mon = fake_tool(&dir, "crm_mon", &format!("cat {}", fixture("crm_mon.xml")));
        let cibadmin = fake_tool(&dir, "cibadmin", &format!("cat {}", fixture("cib.xml")));

        let collector = PacemakerCollector::new(&crm_mon, &cibadmin).unwrap();
        let metrics = collector.collect().unwrap();

        assert_eq!(metrics.iter().filter(|m| m.name() == "nodes").count(), 18);
        let dc = find(&metrics, "nodes", &[("node", "hana01"), ("status", "dc")]).unwrap();
        assert_eq!(dc.value, 1.0);

        let slave = find(
            &metrics,
            "resources",
            &[("role", "slave"), ("status", "active")],
        )
        .unwrap();
        assert_eq!(slave.label("node"), Some("hana02"));
        assert_eq!(slave.label("clone"), Some("msl_SAPHana_PRD_HDB00"));
        assert_eq!(slave.value, 1.0);

        let stonith_failcount = find(&metrics, "fail_count", &[("resource", "stonith-sbd")]).unwrap();
        assert_eq!(stonith_failcount.value, f64::INFINITY);
        let ip_failcount = find(&metrics, "fail_count", &[("resource", "rsc_ip_HA1_ASCS00")]).unwrap();
        assert_eq!(ip_failcount.label("node"), Some("hana02"));
        assert_eq!(ip_failcount.value, 2.0);

        assert_eq!(find(&metrics, "config_last_change", &[]).unwrap().value, 1571399302.0);
        assert_eq!(
            find(&metrics, "location_constraints", &[("resource", "grp_HA1_ASCS00")])
                .unwrap()
                .value,
            f64::NEG_INFINITY
        );
        assert_eq!(
            metrics.iter().filter(|m| m.name() == "node_attributes").count(),
            3
        );
    }

    #[test]
    fn test_pacemaker_collector_crm_mon_failure() {
        let dir = TempDir::new().unwrap();
        let crm_mon = fake_tool(&dir, "crm_mon", "echo 'connection to cluster failed' >&2\nexit 102");
        let cibadmin = fake_tool(&dir, "cibadmin", &format!("cat {}", fixture("cib.xml")));

        let collector = PacemakerCollector::new(&crm_mon, &cibadmin).unwrap();
        let err = collector.collect().unwrap_err();

        assert!(err.to_string().starts_with(&format!("could not execute '{crm_mon} -X --group-by-node --inactive'")));
        assert!(err.to_string().contains("connection to cluster failed"));
    }

    #[test]
    fn test_drbd_collector() {
        let dir = TempDir::new().unwrap();
        let drbdsetup = fake_tool(&dir, "drbdsetup", &format!("cat {}", fixture("drbdsetup_status.json")));
        let splitbrain = dir.path().join("splitbrain");
        fs::create_dir(&splitbrain).unwrap();
        File::create(splitbrain.join("drbd-split-brain-detected-resource01-vol01")).unwrap();

        let collector = DrbdCollector::new(&drbdsetup, &splitbrain.to_string_lossy()).unwrap();
        let metrics = collector.collect().unwrap();

        let written = find(&metrics, "written", &[("resource", "1-single-0"), ("volume", "0")]).unwrap();
        assert_eq!(written.value, 123456.0);

        let split_brain = find(&metrics, "split_brain", &[]).unwrap();
        assert_eq!(split_brain.label("resource"), Some("resource01"));
        assert_eq!(split_brain.label("volume"), Some("vol01"));
    }

    #[test]
    fn test_drbd_collector_reports_split_brain_when_drbdsetup_fails() {
        let dir = TempDir::new().unwrap();
        let drbdsetup = fake_tool(&dir, "drbdsetup", "exit 10");
        File::create(dir.path().join("drbd-split-brain-detected-r0-0")).unwrap();

        let collector = InstrumentedCollector::new(Box::new(
            DrbdCollector::new(&drbdsetup, &dir.path().to_string_lossy()).unwrap(),
        ));
        let scrape = collector.scrape();

        assert!(!scrape.success);
        let split_brain = find(&scrape.metrics, "split_brain", &[]).unwrap();
        assert_eq!(split_brain.label("resource"), Some("r0"));
        assert_eq!(split_brain.label("volume"), Some("0"));
        assert_eq!(find(&scrape.metrics, "success", &[("collector", "drbd")]).unwrap().value, 0.0);

        let output = exposition::gather(&[collector]).unwrap();
        assert!(output.contains("ha_cluster_drbd_split_brain{resource=\"r0\",volume=\"0\"} 1\n"));
    }

    #[test]
    fn test_sbd_collector() {
        let dir = TempDir::new().unwrap();
        let sbd = fake_tool(
            &dir,
            "sbd",
            &format!(
                "case \"$2\" in\n  /dev/vda) cat {} ;;\n  *) echo 'header not found' >&2; exit 1 ;;\nesac",
                fixture("sbd_dump.txt")
            ),
        );

        let collector = SbdCollector::new(&sbd, &fixture("sbd_config")).unwrap();
        let metrics = collector.collect().unwrap();

        let vda = find(&metrics, "devices", &[("device", "/dev/vda")]).unwrap();
        assert_eq!(vda.label("status"), Some("healthy"));
        let vdb = find(&metrics, "devices", &[("device", "/dev/vdb")]).unwrap();
        assert_eq!(vdb.label("status"), Some("unhealthy"));

        let watchdog = find(&metrics, "timeouts", &[("device", "/dev/vda"), ("type", "watchdog")]).unwrap();
        assert_eq!(watchdog.value, 5.0);
        let msgwait = find(&metrics, "timeouts", &[("device", "/dev/vda"), ("type", "msgwait")]).unwrap();
        assert_eq!(msgwait.value, 10.0);
        assert!(find(&metrics, "timeouts", &[("device", "/dev/vdb")]).is_none());
    }

    #[test]
    fn test_collector_checks_executable_bits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dummy");
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        let dummy = path.to_string_lossy().into_owned();

        let err = DrbdCollector::new(&dummy, "/var/run/drbd/splitbrain").err().unwrap();
        assert_eq!(
            err.to_string(),
            format!("could not initialize 'drbd' collector: '{dummy}' is not executable")
        );

        let err = SbdCollector::new(&dummy, &fixture("sbd_config")).err().unwrap();
        assert!(err.to_string().contains("is not executable"));
    }

    #[test]
    fn test_gather_exposes_all_collectors() {
        let dir = TempDir::new().unwrap();
        let drbdsetup = fake_tool(&dir, "drbdsetup", &format!("cat {}", fixture("drbdsetup_status.json")));
        let cfgtool = fake_tool(&dir, "corosync-cfgtool", "exit 1");
        let quorumtool = fake_tool(&dir, "corosync-quorumtool", "exit 1");

        let collectors = vec![
            InstrumentedCollector::new(Box::new(
                DrbdCollector::new(&drbdsetup, "/nonexistent/splitbrain").unwrap(),
            )),
            InstrumentedCollector::new(Box::new(
                CorosyncCollector::new(&cfgtool, &quorumtool).unwrap(),
            )),
        ];
        let output = exposition::gather(&collectors).unwrap();

        assert!(output.contains("# TYPE ha_cluster_drbd_written gauge\n"));
        assert!(output.contains("ha_cluster_drbd_written{resource=\"1-single-0\",volume=\"0\"} 123456\n"));
        assert!(output.contains("ha_cluster_drbd_connections_sync{peer_node_id=\"1\",resource=\"1-single-1\",volume=\"0\"} 99.8\n"));
        assert!(output.contains("ha_cluster_scrape_success{collector=\"drbd\"} 1\n"));
        assert!(output.contains("ha_cluster_scrape_success{collector=\"corosync\"} 0\n"));
        assert!(output.contains("ha_cluster_scrape_duration_seconds{collector=\"corosync\"}"));
        assert!(!output.contains("ha_cluster_corosync_quorate"));
    }
}
