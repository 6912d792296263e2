mod common;

#[cfg(test)]
mod coordinator_tests {
    use super::common::{day, init_test_logging, MockPackageSource};
    use pkgdeps::source::PackageSource;
    use pkgdeps::{CancellationToken, DepInfoError, DependencyTracker, TrackerConfig};
    use std::sync::Arc;

    const NODES: usize = 40;

    fn name(i: usize) -> String {
        format!("/Game/Pkg{i:02}")
    }

    /// Every node points at the next two (wrapping), so the graph is one big cycle
    /// with plenty of shared edges. A few nodes also reference a missing package.
    fn cyclic_source(with_missing: bool) -> MockPackageSource {
        let mut source = MockPackageSource::new();
        for i in 0..NODES {
            let a = name((i + 1) % NODES);
            let b = name((i + 7) % NODES);
            let mut deps = vec![a.as_str(), b.as_str()];
            if with_missing && i == 30 {
                deps.push("/Game/Missing");
            }
            source = source.package(&name(i), &deps);
        }
        source
    }

    fn tracker_for(source: &Arc<MockPackageSource>, with_missing: bool) -> DependencyTracker {
        init_test_logging();
        let mut tracker = DependencyTracker::new(
            TrackerConfig::default(),
            Arc::clone(source) as Arc<dyn PackageSource>,
        );
        for i in 0..NODES {
            tracker.register_package(name(i), day((i % 28) as u32 + 1));
        }
        if with_missing {
            tracker.register_package("/Game/Missing", day(1));
        }
        tracker
    }

    #[test]
    fn test_concurrent_matches_sequential() {
        let sequential_source = Arc::new(cyclic_source(false));
        let sequential = tracker_for(&sequential_source, false);
        sequential.resolve_all();

        let concurrent_source = Arc::new(cyclic_source(false));
        let concurrent = tracker_for(&concurrent_source, false);
        let report = concurrent
            .resolve_all_concurrently::<&str>(&[], 8, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.discovered, NODES);
        assert_eq!(report.hashed, NODES);
        assert_eq!(report.invalid, 0);
        for i in 0..NODES {
            assert_eq!(
                sequential.dependent_hash(&name(i)).unwrap(),
                concurrent.dependent_hash(&name(i)).unwrap(),
                "{}",
                name(i)
            );
            assert_eq!(
                sequential.dependent_timestamp(&name(i)).unwrap(),
                concurrent.dependent_timestamp(&name(i)).unwrap()
            );
        }
    }

    #[test]
    fn test_each_package_opened_once() {
        let source = Arc::new(cyclic_source(false));
        let tracker = tracker_for(&source, false);
        tracker
            .resolve_all_concurrently::<&str>(&[], 6, &CancellationToken::new())
            .unwrap();

        for i in 0..NODES {
            assert_eq!(source.opens(&name(i)), 1, "{}", name(i));
        }
        // queries after a full resolution never go back to the source
        tracker.dependent_hash(&name(3)).unwrap();
        assert_eq!(source.total_opens(), NODES);
    }

    #[test]
    fn test_report_counts_invalid_and_degraded() {
        let source = Arc::new(cyclic_source(true));
        let tracker = tracker_for(&source, true);
        let report = tracker
            .resolve_all_concurrently::<&str>(&[], 4, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.discovered, NODES + 1);
        assert_eq!(report.invalid, 1);
        // the whole cycle reaches Pkg30 and through it the missing package
        assert_eq!(report.degraded, NODES);
        assert_eq!(report.hashed, 0);
        assert!(matches!(
            tracker.dependent_hash(&name(0)),
            Err(DepInfoError::DependencyUnresolvable { .. })
        ));
        assert_eq!(source.opens("/Game/Missing"), 1);
    }

    #[test]
    fn test_named_roots_limit_the_work() {
        let source = Arc::new(
            MockPackageSource::new()
                .package("/Game/A", &["/Game/B"])
                .package("/Game/B", &[])
                .package("/Game/C", &[]),
        );
        let mut tracker = DependencyTracker::new(
            TrackerConfig::default(),
            Arc::clone(&source) as Arc<dyn PackageSource>,
        );
        for package in ["/Game/A", "/Game/B", "/Game/C"] {
            tracker.register_package(package, day(2));
        }

        let report = tracker
            .resolve_all_concurrently(&["/Game/A", "/Game/Unknown"], 2, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.discovered, 2);
        assert_eq!(report.hashed, 2);
        assert_eq!(source.opens("/Game/C"), 0);
        assert_eq!(source.opens("/Game/Unknown"), 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let source = Arc::new(cyclic_source(false));
        let tracker = tracker_for(&source, false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = tracker
            .resolve_all_concurrently::<&str>(&[], 4, &cancel)
            .unwrap_err();
        assert!(matches!(err, DepInfoError::Cancelled));
        assert_eq!(source.total_opens(), 0);

        // the graph is still usable afterwards
        assert!(tracker.dependent_hash(&name(0)).unwrap().is_valid());
    }

    #[test]
    fn test_single_worker() {
        let source = Arc::new(cyclic_source(false));
        let tracker = tracker_for(&source, false);
        let report = tracker
            .resolve_all_concurrently::<&str>(&[], 1, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.hashed, NODES);
    }

    #[test]
    fn test_configured_deadline_cancels() {
        init_test_logging();
        let source = Arc::new(cyclic_source(false));
        let config = TrackerConfig {
            resolve_timeout_secs: Some(0),
            ..TrackerConfig::default()
        };
        let mut tracker =
            DependencyTracker::new(config, Arc::clone(&source) as Arc<dyn PackageSource>);
        for i in 0..NODES {
            tracker.register_package(name(i), day(1));
        }

        let cancel = CancellationToken::new();
        let err = tracker
            .resolve_all_concurrently::<&str>(&[], 4, &cancel)
            .unwrap_err();
        assert!(matches!(err, DepInfoError::Cancelled));
        assert!(cancel.is_cancelled());

        // the deadline only bounds the concurrent run
        assert!(tracker.dependent_hash(&name(0)).unwrap().is_valid());
        assert_eq!(tracker.dependent_timestamp(&name(5)).unwrap(), day(1));
    }
}
