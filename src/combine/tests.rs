#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::BufRead;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    use crate::combine::{
        combine_to_db, discover_shards, merge_to_file, BulkLoader, CombineConfig, CombineError,
        CombineProcessor, ComparisonMode, SummaryFormat,
    };

    fn write_shards(dir: &Path, shards: &[&str]) -> Vec<PathBuf> {
        shards
            .iter()
            .enumerate()
            .map(|(i, content)| {
                let path = dir.join(format!("walk.{}.bygroup", i));
                fs::write(&path, content).unwrap();
                path
            })
            .collect()
    }

    fn dir_usage_line(path: &str, gid: u32, count: u64, atime: i64, mtime: i64) -> String {
        let buckets: Vec<String> = (0..16).map(|_| "1".to_string()).collect();
        format!(
            "\"{}\"\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            path,
            gid,
            100,
            0,
            count,
            count * 10,
            atime,
            mtime,
            buckets.join("\t")
        )
    }

    fn dir_usage_age_line(age: u8, count: u64, atime: i64, mtime: i64) -> String {
        let buckets: Vec<String> = (0..16).map(|_| "1".to_string()).collect();
        format!(
            "\"/lustre/a\"\t1\t100\t0\t{}\t{}\t{}\t{}\t{}\t{}\n",
            age,
            count,
            count * 10,
            atime,
            mtime,
            buckets.join("\t")
        )
    }

    /// Captures every record the pipeline hands over.
    #[derive(Default)]
    struct CollectingLoader {
        lines: Vec<String>,
        batch_size: usize,
    }

    impl BulkLoader for CollectingLoader {
        fn store(&mut self, reader: &mut dyn BufRead, batch_size: usize) -> anyhow::Result<()> {
            self.batch_size = batch_size;
            for line in reader.lines() {
                self.lines.push(line?);
            }
            Ok(())
        }
    }

    /// Reads a few records and then gives up.
    struct FailingLoader {
        read_before_failing: usize,
    }

    impl BulkLoader for FailingLoader {
        fn store(&mut self, reader: &mut dyn BufRead, _: usize) -> anyhow::Result<()> {
            let mut line = String::new();
            for _ in 0..self.read_before_failing {
                reader.read_line(&mut line)?;
            }
            anyhow::bail!("database is full")
        }
    }

    #[test]
    fn test_two_shards_sum_pair() {
        let temp_dir = tempdir().unwrap();
        let shards = write_shards(
            temp_dir.path(),
            &["kyle\tKMace34\t1\t2\n", "kyle\tKMace34\t2\t3\n"],
        );
        let output = temp_dir.path().join("combined");

        let stats = merge_to_file(
            &shards,
            &output,
            SummaryFormat::Group,
            CombineConfig::default(),
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "kyle\tKMace34\t3\t5\n");
        assert_eq!(stats.shards_merged, 2);
        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.records_written, 1);
    }

    #[test]
    fn test_six_lines_across_three_shards() {
        let temp_dir = tempdir().unwrap();
        let shards = write_shards(
            temp_dir.path(),
            &[
                "a\tg1\t1\t10\nb\tg2\t1\t100\n",
                "a\tg1\t2\t20\nb\tg2\t2\t200\n",
                "a\tg1\t3\t30\nb\tg2\t3\t300\n",
            ],
        );

        let mut loader = CollectingLoader::default();
        let stats = CombineProcessor::new(SummaryFormat::Group, CombineConfig::default())
            .combine_into(&shards, &mut loader)
            .unwrap();

        assert_eq!(loader.lines, vec!["a\tg1\t6\t60", "b\tg2\t6\t600"]);
        assert_eq!(loader.batch_size, 10_000);
        assert_eq!(stats.records_written, 2);
    }

    #[test]
    fn test_combine_to_db_commits_batches() {
        let temp_dir = tempdir().unwrap();
        let shards = write_shards(
            temp_dir.path(),
            &[
                "u1\tg1\t/a\t1\t1\nu2\tg1\t/a\t1\t1\nu3\tg1\t/a\t1\t1\n",
                "u1\tg1\t/a\t1\t1\nu4\tg1\t/a\t1\t1\n",
            ],
        );
        let db_dir = temp_dir.path().join("db");

        let config = CombineConfig {
            batch_size: 2,
            ..CombineConfig::default()
        };
        let stats = combine_to_db(&shards, &db_dir, SummaryFormat::UserGroup, config).unwrap();
        assert_eq!(stats.records_written, 4);

        let mut partitions: Vec<PathBuf> = fs::read_dir(&db_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        partitions.sort();
        assert_eq!(partitions.len(), 2);

        let contents: String = partitions
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(
            contents,
            "u1\tg1\t/a\t2\t2\nu2\tg1\t/a\t1\t1\nu3\tg1\t/a\t1\t1\nu4\tg1\t/a\t1\t1\n"
        );
    }

    #[test]
    fn test_dir_usage_keeps_oldest_atime_and_newest_mtime() {
        let temp_dir = tempdir().unwrap();
        let first_shard = format!(
            "{}{}",
            dir_usage_line("/lustre/a", 1, 2, 500, 900),
            dir_usage_line("/lustre/b", 1, 1, 100, 100)
        );
        let second_shard = dir_usage_line("/lustre/a", 1, 3, 300, 700);
        let shards = write_shards(temp_dir.path(), &[first_shard.as_str(), second_shard.as_str()]);

        let mut loader = CollectingLoader::default();
        CombineProcessor::new(SummaryFormat::DirGroupUserType, CombineConfig::default())
            .combine_into(&shards, &mut loader)
            .unwrap();

        assert_eq!(loader.lines.len(), 2);
        let first: Vec<&str> = loader.lines[0].split('\t').collect();
        assert_eq!(first.len(), SummaryFormat::DirGroupUserType.total_columns());
        assert_eq!(&first[..4], &["\"/lustre/a\"", "1", "100", "0"]);
        assert_eq!(&first[4..8], &["5", "50", "300", "900"]);
        assert!(first[8..].iter().all(|bucket| *bucket == "2"));
    }

    #[test]
    fn test_dir_usage_age_keeps_buckets_apart() {
        let temp_dir = tempdir().unwrap();
        let first_shard = format!(
            "{}{}",
            dir_usage_age_line(0, 2, 500, 900),
            dir_usage_age_line(1, 4, 50, 60)
        );
        let second_shard = dir_usage_age_line(0, 3, 300, 700);
        let shards = write_shards(temp_dir.path(), &[first_shard.as_str(), second_shard.as_str()]);

        let mut loader = CollectingLoader::default();
        let stats = CombineProcessor::new(SummaryFormat::DirGroupUserTypeAge, CombineConfig::default())
            .combine_into(&shards, &mut loader)
            .unwrap();

        assert_eq!(stats.lines_read, 3);
        assert_eq!(stats.records_written, 2);

        let merged: Vec<&str> = loader.lines[0].split('\t').collect();
        assert_eq!(merged.len(), SummaryFormat::DirGroupUserTypeAge.total_columns());
        assert_eq!(&merged[..5], &["\"/lustre/a\"", "1", "100", "0", "0"]);
        assert_eq!(&merged[5..9], &["5", "50", "300", "900"]);
        assert!(merged[9..].iter().all(|bucket| *bucket == "2"));

        let separate: Vec<&str> = loader.lines[1].split('\t').collect();
        assert_eq!(&separate[4..9], &["1", "4", "40", "50", "60"]);
        assert!(separate[9..].iter().all(|bucket| *bucket == "1"));
    }

    #[test]
    fn test_summed_overflow_aborts_and_commits_nothing() {
        let temp_dir = tempdir().unwrap();
        let shards = write_shards(
            temp_dir.path(),
            &["a\tb\t1\t9223372036854775807\n", "a\tb\t1\t1\n"],
        );
        let db_dir = temp_dir.path().join("db");

        let err = combine_to_db(&shards, &db_dir, SummaryFormat::Group, CombineConfig::default())
            .unwrap_err();

        assert!(matches!(err, CombineError::SumOverflow { column: 3, .. }));
        assert_eq!(fs::read_dir(&db_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_sink_failure_returns_error_without_hanging() {
        let temp_dir = tempdir().unwrap();
        let content: String = (0..5_000).map(|i| format!("k{:05}\tg\t1\t1\n", i)).collect();
        let shards = write_shards(temp_dir.path(), &[content.as_str(), content.as_str()]);

        let start = Instant::now();
        let err = CombineProcessor::new(SummaryFormat::Group, CombineConfig::default())
            .combine_into(&shards, &mut FailingLoader { read_before_failing: 3 })
            .unwrap_err();

        assert!(matches!(err, CombineError::Sink(_)));
        assert!(err.to_string().contains("database is full"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_sink_failing_immediately() {
        let temp_dir = tempdir().unwrap();
        let shards = write_shards(temp_dir.path(), &["a\tb\t1\t1\n"]);

        let err = CombineProcessor::new(SummaryFormat::Group, CombineConfig::default())
            .combine_into(&shards, &mut FailingLoader { read_before_failing: 0 })
            .unwrap_err();
        assert!(matches!(err, CombineError::Sink(_)));
    }

    #[test]
    fn test_reducer_failure_is_reported_and_nothing_committed() {
        let temp_dir = tempdir().unwrap();
        let shards = write_shards(temp_dir.path(), &["a\tb\t1\t1\n", "a\tb\tlots\t1\n"]);
        let db_dir = temp_dir.path().join("db");

        let err = combine_to_db(&shards, &db_dir, SummaryFormat::Group, CombineConfig::default())
            .unwrap_err();

        assert!(matches!(err, CombineError::MalformedNumber { .. }));
        assert_eq!(fs::read_dir(&db_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_unquote_failure_aborts_pipeline() {
        let temp_dir = tempdir().unwrap();
        let shards = write_shards(temp_dir.path(), &["not-quoted\t1\t1\t1\t1\t1\n"]);

        let mut loader = CollectingLoader::default();
        let err = CombineProcessor::new(SummaryFormat::DirGroupUserType, CombineConfig::default())
            .combine_into(&shards, &mut loader)
            .unwrap_err();
        assert!(matches!(err, CombineError::Unquote { .. }));
    }

    #[test]
    fn test_comparison_override() {
        let temp_dir = tempdir().unwrap();
        // "\x61" decodes to "a", so it sorts first only when unquoting.
        let shards = write_shards(temp_dir.path(), &["\"b\"\tg\t1\t1\n", "\"\\x61\"\tg\t1\t1\n"]);
        let output = temp_dir.path().join("out");

        let config = CombineConfig {
            comparison: Some(ComparisonMode::Unquoted),
            ..CombineConfig::default()
        };
        merge_to_file(&shards, &output, SummaryFormat::Group, config).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "\"\\x61\"\tg\t1\t1\n\"b\"\tg\t1\t1\n"
        );
    }

    #[test]
    fn test_empty_shards_produce_empty_output() {
        let temp_dir = tempdir().unwrap();
        let shards = write_shards(temp_dir.path(), &["", ""]);

        let mut loader = CollectingLoader::default();
        let stats = CombineProcessor::new(SummaryFormat::Group, CombineConfig::default())
            .combine_into(&shards, &mut loader)
            .unwrap();

        assert!(loader.lines.is_empty());
        assert_eq!(stats.records_written, 0);
    }

    #[test]
    fn test_missing_shard_file() {
        let temp_dir = tempdir().unwrap();
        let missing = vec![temp_dir.path().join("nope.bygroup")];

        let err = merge_to_file(
            &missing,
            &temp_dir.path().join("out"),
            SummaryFormat::Group,
            CombineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CombineError::OpenShard { .. }));
    }

    #[test]
    fn test_discover_shards() {
        let temp_dir = tempdir().unwrap();
        write_shards(temp_dir.path(), &["", "", ""]);
        fs::write(temp_dir.path().join("walk.0.byusergroup"), "").unwrap();
        fs::create_dir(temp_dir.path().join("nested.bygroup")).unwrap();

        let shards = discover_shards(temp_dir.path(), ".bygroup").unwrap();
        let names: Vec<_> = shards
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["walk.0.bygroup", "walk.1.bygroup", "walk.2.bygroup"]);

        let err = discover_shards(temp_dir.path(), ".dgut").unwrap_err();
        assert!(matches!(err, CombineError::NoShards { .. }));
    }

    #[test]
    fn test_config_validation() {
        let mut config = CombineConfig::default();
        assert!(config.validate().is_ok());

        config.batch_size = 0;
        assert!(config.validate().is_err());

        config.batch_size = 100;
        config.io_buffer_size_kb = 1;
        assert!(config.validate().is_err());

        config.io_buffer_size_kb = 64;
        config.verbosity = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("combine.json");

        let config = CombineConfig {
            batch_size: 500,
            comparison: Some(ComparisonMode::Unquoted),
            ..CombineConfig::default()
        };
        config.to_file(&path).unwrap();

        let loaded = CombineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.batch_size, 500);
        assert_eq!(loaded.comparison, Some(ComparisonMode::Unquoted));
        assert_eq!(loaded.comparison_for(SummaryFormat::Group), ComparisonMode::Unquoted);

        fs::write(&path, r#"{"batch_size": 7}"#).unwrap();
        let partial = CombineConfig::from_file(&path).unwrap();
        assert_eq!(partial.batch_size, 7);
        assert_eq!(partial.io_buffer_size_kb, 64);
        assert_eq!(partial.comparison_for(SummaryFormat::DirGroupUserTypeAge), ComparisonMode::Unquoted);
    }
}
