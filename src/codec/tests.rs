//! Unit tests for the line codec.
//!
//! Covers single-frame decoding, malformed input rejection, streaming
//! accumulation of partial reads, and EOF handling.

use bytes::BytesMut;
use proptest::prelude::*;
use rstest::rstest;

use super::*;

#[rstest]
#[case(b"echo hello\n".as_slice(), "echo", "hello")]
#[case(b"upper hello world\n".as_slice(), "upper", "hello world")]
#[case(b"echo hello\r\n".as_slice(), "echo", "hello")]
#[case(b"echo a\\nb\\\\c\\r\n".as_slice(), "echo", "a\nb\\c\r")]
#[case(b"echo  leading space\n".as_slice(), "echo", " leading space")]
#[case("reverse h\u{e9}llo\n".as_bytes(), "reverse", "h\u{e9}llo")]
fn decodes_well_formed_requests(
    #[case] bytes: &[u8],
    #[case] action: &str,
    #[case] message: &str,
) {
    let request = decode_request(bytes).expect("frame should decode");
    assert_eq!(request, Request::new(action, message));
}

#[rstest]
#[case::no_terminator(b"echo hello".as_slice(), FramingError::MissingTerminator)]
#[case::no_delimiter(b"echo\n".as_slice(), FramingError::MissingDelimiter)]
#[case::empty_action(b" hello\n".as_slice(), FramingError::EmptyAction)]
#[case::empty_message(b"echo \n".as_slice(), FramingError::EmptyMessage)]
#[case::empty_frame(b"\n".as_slice(), FramingError::MissingDelimiter)]
#[case::bad_utf8(b"echo \xff\xfe\n".as_slice(), FramingError::InvalidUtf8)]
#[case::bad_escape(b"echo a\\tb\n".as_slice(), FramingError::InvalidEscape { offset: 1 })]
#[case::dangling_escape(b"echo ab\\\n".as_slice(), FramingError::InvalidEscape { offset: 2 })]
#[case::trailing(b"echo a\nmore".as_slice(), FramingError::TrailingBytes { count: 4 })]
fn rejects_malformed_requests(#[case] bytes: &[u8], #[case] expected: FramingError) {
    match decode_request(bytes) {
        Err(CodecError::MalformedRequest(err)) => assert_eq!(err, expected),
        other => panic!("expected malformed request, got {other:?}"),
    }
}

#[test]
fn encodes_empty_response_as_bare_terminator() {
    assert_eq!(&encode_response(&Response::default())[..], b"\n");
}

#[test]
fn error_response_survives_framing() {
    let response = Response::error("unknown action: frobnicate");
    let bytes = encode_response(&response);
    assert_eq!(&bytes[..], b"error: unknown action: frobnicate\n");
    assert_eq!(decode_response(&bytes).expect("decode"), response);
}

#[rstest]
#[case::empty_action(Request::new("", "x"), FramingError::EmptyAction)]
#[case::spaced_action(Request::new("two words", "x"), FramingError::ReservedCharacter)]
#[case::empty_message(Request::new("echo", ""), FramingError::EmptyMessage)]
fn encode_request_rejects_invalid_requests(#[case] request: Request, #[case] expected: FramingError) {
    assert_eq!(encode_request(&request).expect_err("should fail"), expected);
}

#[test]
fn oversized_buffer_is_rejected_before_scanning() {
    let mut bytes = vec![b'a'; MAX_FRAME_LENGTH];
    bytes.extend_from_slice(b" b\n");
    let err = decode_request(&bytes).expect_err("oversized frame");
    assert_eq!(
        err.framing(),
        Some(&FramingError::OversizedFrame {
            size: MAX_FRAME_LENGTH + 3,
            max: MAX_FRAME_LENGTH,
        })
    );
}

#[test]
fn decode_response_requires_terminator() {
    let err = decode_response(b"HELLO").expect_err("unterminated response");
    assert!(matches!(
        err,
        CodecError::MalformedResponse(FramingError::MissingTerminator)
    ));
}

#[test]
fn streaming_decoder_accumulates_partial_reads() {
    let mut codec = RequestCodec::default();
    let mut buf = BytesMut::new();

    for chunk in [b"up".as_slice(), b"per hel", b"lo"] {
        buf.extend_from_slice(chunk);
        assert!(codec.decode(&mut buf).expect("partial frame").is_none());
    }

    buf.extend_from_slice(b"\n");
    let request = codec
        .decode(&mut buf)
        .expect("decode should succeed")
        .expect("expected a request");
    assert_eq!(request, Request::new("upper", "hello"));
    assert!(buf.is_empty());
}

#[test]
fn streaming_decoder_reports_malformed_frame() {
    let mut codec = RequestCodec::default();
    let mut buf = BytesMut::from(&b"echo\n"[..]);
    let err = codec.decode(&mut buf).expect_err("missing delimiter");
    assert!(matches!(
        err,
        CodecError::MalformedRequest(FramingError::MissingDelimiter)
    ));
}

#[test]
fn streaming_decoder_rejects_oversized_frames() {
    let mut codec = RequestCodec::new(MIN_FRAME_LENGTH);
    let mut buf = BytesMut::from(vec![b'a'; MIN_FRAME_LENGTH + 1].as_slice());
    let err = codec.decode(&mut buf).expect_err("oversized");
    assert!(matches!(
        err,
        CodecError::MalformedRequest(FramingError::OversizedFrame { size, max })
            if size == MIN_FRAME_LENGTH + 1 && max == MIN_FRAME_LENGTH
    ));
}

#[test]
fn request_codec_clamps_max_frame_length() {
    assert_eq!(RequestCodec::new(0).max_frame_length(), MIN_FRAME_LENGTH);
    assert_eq!(
        RequestCodec::new(MAX_FRAME_LENGTH.saturating_add(1)).max_frame_length(),
        MAX_FRAME_LENGTH
    );
}

#[test]
fn decode_eof_with_empty_buffer_returns_none() {
    let mut codec = RequestCodec::default();
    let mut buf = BytesMut::new();
    let result = codec.decode_eof(&mut buf);
    assert!(
        matches!(result, Ok(None)),
        "clean close should return Ok(None), got {result:?}"
    );
}

#[test]
fn decode_eof_with_partial_frame_is_truncated() {
    let mut codec = RequestCodec::default();
    let mut buf = BytesMut::from(&b"echo hel"[..]);
    assert!(codec.decode(&mut buf).expect("partial").is_none());

    let err = codec.decode_eof(&mut buf).expect_err("truncated frame");
    assert!(matches!(
        err,
        CodecError::MalformedRequest(FramingError::Truncated { bytes_received: 8 })
    ));
}

#[test]
fn response_codec_mirrors_request_codec() {
    let mut client = ResponseCodec::default();
    let mut server = RequestCodec::default();
    let mut wire = BytesMut::new();

    client
        .encode(Request::new("echo", "line one\nline two"), &mut wire)
        .expect("encode request");
    let request = server
        .decode(&mut wire)
        .expect("decode request")
        .expect("complete request");
    assert_eq!(request.message, "line one\nline two");

    server
        .encode(Response::new(request.message), &mut wire)
        .expect("encode response");
    let response = client
        .decode_eof(&mut wire)
        .expect("decode response")
        .expect("complete response");
    assert_eq!(response.message, "line one\nline two");
}

fn action_strategy() -> impl Strategy<Value = String> { "[a-z][a-z0-9_-]{0,15}" }

proptest! {
    #[test]
    fn valid_requests_round_trip(action in action_strategy(), message in ".+") {
        let request = Request::new(action, message);
        let bytes = encode_request(&request).expect("valid request encodes");
        prop_assert_eq!(decode_request(&bytes).expect("decode"), request);
    }

    #[test]
    fn responses_round_trip(message in any::<String>()) {
        let response = Response::new(message);
        let bytes = encode_response(&response);
        prop_assert_eq!(decode_response(&bytes).expect("decode"), response);
    }

    #[test]
    fn frames_without_terminator_never_decode(bytes in proptest::collection::vec(
        any::<u8>().prop_filter("no terminator", |b| *b != TERMINATOR),
        0..256,
    )) {
        let result = decode_request(&bytes);
        prop_assert!(matches!(
            result,
            Err(CodecError::MalformedRequest(FramingError::MissingTerminator))
        ));
    }
}
