//! Error handling integration tests.
//!
//! These tests verify that end of stream is told apart from failures and that
//! failures carry enough context to diagnose the producer.

use std::io::Cursor;

use gopstat::{
    AnalysisOptions, FrameRecord, GopReport, GopStatError, ProbeCommand, RecordDecoder,
    analyze_source,
};

#[test]
fn end_of_stream_is_not_a_failure() {
    let error = GopStatError::EndOfStream;
    assert!(error.is_end_of_stream());
    assert_eq!(error.to_string(), "End of frame stream");

    let framing = GopStatError::RecordFraming {
        reason: "expected ','".to_string(),
        offset: 12,
    };
    assert!(!framing.is_end_of_stream());
}

#[test]
fn framing_error_reports_offset() {
    let mut decoder = RecordDecoder::new(Cursor::new(r#"[{"a": 1} !"#));
    assert!(decoder.read_record().is_ok());
    let error_message = decoder.read_record().unwrap_err().to_string();
    assert!(
        error_message.contains("Record framing error at byte"),
        "Error message should mention framing: {error_message}",
    );
    assert!(
        error_message.contains("'!'"),
        "Error message should name the unexpected byte: {error_message}",
    );
}

#[test]
fn decode_error_quotes_the_buffer() {
    let error_message = FrameRecord::from_slice(br#"{"width": "wide"}"#)
        .unwrap_err()
        .to_string();
    assert!(
        error_message.contains(r#"{"width": "wide"}"#),
        "Error message should include the record: {error_message}",
    );
}

#[test]
fn invalid_chunk_duration_message() {
    let error_message = GopStatError::InvalidChunkDuration(-2.0).to_string();
    assert!(
        error_message.contains("positive"),
        "Error message should explain the constraint: {error_message}",
    );
}

#[test]
fn io_errors_convert() {
    let error: GopStatError = std::io::Error::other("pipe closed").into();
    assert!(matches!(error, GopStatError::IoError(_)));
    assert!(error.to_string().contains("pipe closed"));
}

#[test]
fn missing_probe_program_fails_to_spawn() {
    let command =
        ProbeCommand::new("input.mp4").with_program("this_program_does_not_exist_gopstat");
    let mut reports: Vec<GopReport> = Vec::new();
    let result = analyze_source(&command, &AnalysisOptions::new(), &mut reports);

    match result {
        Err(GopStatError::ProbeSpawn { program, .. }) => {
            assert_eq!(program, "this_program_does_not_exist_gopstat");
        }
        other => panic!("expected ProbeSpawn, got {other:?}"),
    }
}
