use std::fs::File;
use std::io::Write as _;

use instream::{InputStream, SeekBasis};

fn file_stream(contents: &[u8]) -> (tempfile::TempDir, InputStream) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.bin");
    std::fs::write(&path, contents).unwrap();
    let file = File::open(&path).unwrap();
    (dir, InputStream::from_reader(file))
}

#[test]
fn file_backed_stream_supports_core_workflow() -> Result<(), Box<dyn std::error::Error>> {
    let payload = b"a man a can a planal canada";
    let (_dir, mut stream) = file_stream(payload);

    assert_eq!(stream.length()?, payload.len() as i64);

    // Drain through a fixed-size buffer, the way an upload pipeline would.
    let mut buf = [0_u8; 4];
    let mut out = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        assert!(n <= buf.len());
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, payload);

    let status = stream.status()?;
    assert!(status.is_valid);
    assert!(status.is_end_of_stream);

    // Rewind and the stream is readable again.
    stream.seek(0, SeekBasis::Start)?;
    let status = stream.status()?;
    assert!(status.is_valid);
    assert!(!status.is_end_of_stream);

    let n = stream.read(&mut buf)?;
    assert_eq!(&buf[..n], &payload[..n]);

    stream.destroy();
    assert!(stream.is_destroyed());
    Ok(())
}

#[test]
fn io_copy_consumes_a_file_backed_stream() -> Result<(), Box<dyn std::error::Error>> {
    let payload = b"a long string here";
    let (_dir, mut stream) = file_stream(payload);

    let mut out = Vec::new();
    let copied = std::io::copy(&mut stream, &mut out)?;
    assert_eq!(copied, payload.len() as u64);
    assert_eq!(out, payload);
    Ok(())
}

#[test]
fn length_survives_appends_between_calls() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("growing.bin");
    std::fs::write(&path, b"abc")?;

    let mut stream = InputStream::from_reader(File::open(&path)?);
    assert_eq!(stream.length()?, 3);

    let mut writer = std::fs::OpenOptions::new().append(true).open(&path)?;
    writer.write_all(b"def")?;
    writer.sync_all()?;

    assert_eq!(stream.length()?, 6);
    Ok(())
}
