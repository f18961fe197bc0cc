//! End-to-end pipeline tests over in-memory and file-backed input.

use std::fmt::Write as _;
use std::fs::File;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use gopstat::{
    AnalysisOptions, GopReport, GopStatError, JsonLinesSink, ProgressCallback, ProgressInfo,
    TextSink, analyze,
};

/// Render frames the way ffprobe does: a top-level object holding the array.
fn probe_document(frames: &[(f64, u64, &str)]) -> String {
    let mut document = String::from("{\n    \"frames\": [\n");
    for (index, (time, size, pict_type)) in frames.iter().enumerate() {
        if index > 0 {
            document.push_str(",\n");
        }
        write!(
            document,
            "        {{\n            \"media_type\": \"video\",\n            \"key_frame\": {},\n            \"pkt_pts_time\": \"{time:.6}\",\n            \"pkt_dts_time\": \"{time:.6}\",\n            \"pkt_size\": \"{size}\",\n            \"pict_type\": \"{pict_type}\"\n        }}",
            u8::from(*pict_type == "I"),
        )
        .expect("write");
    }
    document.push_str("\n    ]\n}\n");
    document
}

/// Two five-second GOPs of 125000 bytes, closed by a keyframe at 10 s.
fn scenario_document() -> String {
    let mut frames = Vec::new();
    for gop_start in [0.0, 5.0] {
        frames.push((gop_start, 25_000, "I"));
        for offset in 1..5 {
            frames.push((gop_start + offset as f64, 25_000, "P"));
        }
    }
    frames.push((10.0, 30_000, "I"));
    probe_document(&frames)
}

#[test]
fn analyzes_probe_document() {
    let options = AnalysisOptions::new().with_chunk_max_duration(8.0);
    let mut reports: Vec<GopReport> = Vec::new();
    let summary = analyze(scenario_document().as_bytes(), &options, &mut reports).expect("analyze");

    assert_eq!(summary.frames, 11);
    assert_eq!(summary.skipped_frames, 0);
    assert_eq!(summary.gops, 2);
    assert_eq!(summary.chunks(), 1);
    assert_eq!(summary.statistics.mean(), 195.3125);
    assert_eq!(summary.pending.gop_bytes, 30_000);

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].gop.bytes, 125_000);
    assert_eq!(reports[1].chunk.expect("chunk").chunk.bytes, 250_000);
}

#[test]
fn default_threshold_is_ten_seconds() {
    let mut reports: Vec<GopReport> = Vec::new();
    let summary = analyze(
        scenario_document().as_bytes(),
        &AnalysisOptions::default(),
        &mut reports,
    )
    .expect("analyze");

    // 10 s of GOPs does not exceed a 10 s threshold.
    assert_eq!(summary.gops, 2);
    assert_eq!(summary.chunks(), 0);
    assert_eq!(summary.pending.chunk_bytes, 250_000);
    assert_eq!(summary.pending.chunk_duration, 10.0);
}

#[test]
fn text_sink_writes_one_line_per_gop() {
    let document = probe_document(&[(0.0, 64_000, "I"), (2.0, 64_000, "P"), (4.0, 1_000, "I")]);
    let options = AnalysisOptions::new().with_chunk_max_duration(3.0);
    let mut sink = TextSink::new(Vec::new());
    analyze(document.as_bytes(), &options, &mut sink).expect("analyze");

    let output = String::from_utf8(sink.into_inner()).expect("utf-8");
    assert_eq!(
        output,
        "@   0.000 gop[ 4.000 s,  128000 b,  250.000 k/s], chunk[ 4.000 s,  128000 b,  250.000 k/s], all[ 250.000 k/s,   0.000 sd, 0.000 cv]\n"
    );
}

#[test]
fn text_line_without_chunk() {
    let document = probe_document(&[(1.5, 512, "I"), (2.0, 512, "B"), (3.5, 1, "I")]);
    let mut sink = TextSink::new(Vec::new());
    analyze(document.as_bytes(), &AnalysisOptions::new(), &mut sink).expect("analyze");

    let output = String::from_utf8(sink.into_inner()).expect("utf-8");
    assert_eq!(output, "@   1.500 gop[ 2.000 s,    1024 b,    4.000 k/s]\n");
}

#[test]
fn json_sink_writes_one_object_per_gop() {
    let options = AnalysisOptions::new().with_chunk_max_duration(8.0);
    let mut sink = JsonLinesSink::new(Vec::new());
    analyze(scenario_document().as_bytes(), &options, &mut sink).expect("analyze");

    let output = String::from_utf8(sink.into_inner()).expect("utf-8");
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["gop"]["bytes"], 125_000);
    assert!(lines[0].get("chunk").is_none());
    assert_eq!(lines[1]["chunk"]["bytes"], 250_000);
    assert_eq!(lines[1]["stream"]["count"], 1);
    assert_eq!(lines[1]["stream"]["mean_kbps"], 195.3125);
}

#[test]
fn decoding_twice_gives_identical_reports() {
    let document = scenario_document();
    let options = AnalysisOptions::new().with_chunk_max_duration(4.0);

    let mut first: Vec<GopReport> = Vec::new();
    let mut second: Vec<GopReport> = Vec::new();
    analyze(document.as_bytes(), &options, &mut first).expect("first run");
    analyze(document.as_bytes(), &options, &mut second).expect("second run");

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn reads_from_file() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("frames.json");
    std::fs::write(&path, scenario_document()).expect("Failed to write frames");

    let options = AnalysisOptions::new().with_chunk_max_duration(8.0);
    let mut reports: Vec<GopReport> = Vec::new();
    let file = File::open(&path).expect("Failed to open frames");
    let summary = analyze(file, &options, &mut reports).expect("analyze");

    assert_eq!(summary.gops, 2);
    // Reading stops right after the array's closing bracket.
    let array_end = scenario_document().rfind(']').expect("closing bracket") + 1;
    assert_eq!(summary.bytes_consumed, array_end as u64);
}

#[test]
fn open_ended_stream_completes_successfully() {
    let mut document = scenario_document();
    let cut = document.rfind(']').expect("closing bracket");
    document.truncate(cut);

    let options = AnalysisOptions::new().with_chunk_max_duration(8.0);
    let mut reports: Vec<GopReport> = Vec::new();
    let summary = analyze(document.as_bytes(), &options, &mut reports).expect("analyze");
    assert_eq!(summary.gops, 2);
}

#[test]
fn non_video_records_are_skipped() {
    let document = r#"[
        {"media_type": "video", "pkt_pts_time": "0.0", "pkt_size": "100", "pict_type": "I"},
        {"media_type": "audio", "pkt_pts_time": "0.5", "pkt_size": "5000"},
        {"media_type": "video", "pkt_pts_time": "1.0", "pkt_size": "100", "pict_type": "I"}
    ]"#;

    let mut reports: Vec<GopReport> = Vec::new();
    let summary = analyze(document.as_bytes(), &AnalysisOptions::new(), &mut reports)
        .expect("analyze");

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.skipped_frames, 1);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].gop.bytes, 100);
}

#[test]
fn malformed_record_stops_the_run() {
    let document = r#"[
        {"media_type": "video", "pkt_pts_time": "0.0", "pkt_size": "100", "pict_type": "I"},
        {"media_type": "video", "pkt_pts_time": "1.0", "pkt_size": "many", "pict_type": "P"}
    ]"#;

    let mut reports: Vec<GopReport> = Vec::new();
    let error = analyze(document.as_bytes(), &AnalysisOptions::new(), &mut reports).unwrap_err();
    match error {
        GopStatError::RecordDecode { record, .. } => assert!(record.contains("many")),
        other => panic!("expected RecordDecode, got {other}"),
    }
}

#[test]
fn non_finite_timestamp_stops_the_run() {
    let document = r#"[
        {"media_type": "video", "pkt_pts_time": "0.0", "pkt_size": "100", "pict_type": "I"},
        {"media_type": "video", "pkt_pts_time": "NaN", "pkt_size": "100", "pict_type": "I"},
        {"media_type": "video", "pkt_pts_time": "2.0", "pkt_size": "100", "pict_type": "I"},
        {"media_type": "video", "pkt_pts_time": "3.0", "pkt_size": "100", "pict_type": "I"}
    ]"#;

    let mut reports: Vec<GopReport> = Vec::new();
    let result = analyze(document.as_bytes(), &AnalysisOptions::new(), &mut reports);
    assert!(
        matches!(&result, Err(GopStatError::RecordDecode { record, .. }) if record.contains("NaN")),
        "a NaN time must not be folded into a GOP: {result:?}"
    );
    assert!(reports.is_empty());
}

#[test]
fn invalid_threshold_is_reported_before_reading() {
    let options = AnalysisOptions::new().with_chunk_max_duration(0.0);
    let mut reports: Vec<GopReport> = Vec::new();
    let error = analyze(scenario_document().as_bytes(), &options, &mut reports).unwrap_err();
    assert!(matches!(error, GopStatError::InvalidChunkDuration(_)));
}

struct CountingProgress {
    calls: AtomicU64,
    last_frames: AtomicU64,
}

impl ProgressCallback for CountingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_frames.store(info.frames, Ordering::SeqCst);
    }
}

#[test]
fn progress_fires_every_batch() {
    let progress = Arc::new(CountingProgress {
        calls: AtomicU64::new(0),
        last_frames: AtomicU64::new(0),
    });
    let options = AnalysisOptions::new()
        .with_progress(progress.clone())
        .with_batch_size(5);

    let mut reports: Vec<GopReport> = Vec::new();
    analyze(scenario_document().as_bytes(), &options, &mut reports).expect("analyze");

    // 11 frames in batches of 5.
    assert_eq!(progress.calls.load(Ordering::SeqCst), 2);
    assert_eq!(progress.last_frames.load(Ordering::SeqCst), 10);
}

#[test]
fn options_debug_and_clamping() {
    let options = AnalysisOptions::new().with_batch_size(0).with_max_record_len(10);
    let debug = format!("{options:?}");
    assert!(debug.contains("AnalysisOptions"));
    assert!(debug.contains("batch_size: 1"));
    assert_eq!(options.max_record_len(), 1024);
    assert_eq!(options.chunk_max_duration(), 10.0);
}
