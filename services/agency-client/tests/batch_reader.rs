//! BatchReader behaviour over real files

use std::io::Write;

use agency_client::{BatchReader, BetRecord, ClientError};
use tempfile::NamedTempFile;

fn write_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Lines of uneven length with blank lines mixed in
fn sample_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            format!(
                "Nombre{}{},Apellido{},{},19{:02}-0{}-1{},{}",
                i,
                "x".repeat(i % 17),
                i * 7,
                30_000_000 + i * 13,
                i % 100,
                i % 9 + 1,
                i % 10,
                i * 31 % 10_000
            )
        })
        .collect()
}

fn expected(agency_id: &str, lines: &[String]) -> Vec<BetRecord> {
    lines
        .iter()
        .map(|l| BetRecord::decode_csv(agency_id, l).unwrap())
        .collect()
}

async fn read_all(reader: &mut BatchReader) -> Vec<Vec<BetRecord>> {
    let mut batches = Vec::new();
    loop {
        let batch = reader.read().await.unwrap();
        if batch.is_empty() {
            return batches;
        }
        batches.push(batch);
    }
}

#[tokio::test]
async fn test_three_lines_batch_of_two() {
    let file = write_file(
        "Santiago,Lionel,30904465,1999-03-17,7574\r\n\
         Ana,Perez,111,1990-01-01,1\r\n\
         Juan,Gomez,222,1985-05-05,2\r\n",
    );
    let mut reader = BatchReader::open(file.path(), 2, "1").await.unwrap();

    let first = reader.read().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].first_name, "Santiago");
    assert_eq!(first[1].first_name, "Ana");

    let second = reader.read().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].first_name, "Juan");

    assert!(reader.read().await.unwrap().is_empty());
    assert!(reader.is_closed());
}

#[tokio::test]
async fn test_empty_batch_is_idempotent() {
    let file = write_file("Ana,Perez,111,1990-01-01,1\r\n");
    let mut reader = BatchReader::open(file.path(), 5, "1").await.unwrap();

    assert_eq!(reader.read().await.unwrap().len(), 1);
    for _ in 0..3 {
        assert!(reader.read().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_any_chunk_size_yields_every_line_once() {
    let lines = sample_lines(60);
    let mut content = String::new();
    for (i, line) in lines.iter().enumerate() {
        content.push_str(line);
        content.push_str("\r\n");
        if i % 11 == 0 {
            content.push_str("\r\n  \r\n");
        }
    }
    let file = write_file(&content);
    let want = expected("5", &lines);

    for chunk_size in [1, 2, 3, 5, 7, 13, 31, 64, 100, 4096] {
        for batch_size in [1, 4, 7, 60, 100] {
            let mut reader = BatchReader::open(file.path(), batch_size, "5")
                .await
                .unwrap()
                .with_chunk_size(chunk_size);

            let batches = read_all(&mut reader).await;
            let (last, full) = batches.split_last().unwrap();
            assert!(full.iter().all(|b| b.len() == batch_size));
            assert!(!last.is_empty() && last.len() <= batch_size);

            let got: Vec<BetRecord> = batches.into_iter().flatten().collect();
            assert_eq!(
                got, want,
                "chunk_size={} batch_size={}",
                chunk_size, batch_size
            );
        }
    }
}

#[tokio::test]
async fn test_last_line_without_terminator() {
    let lines = sample_lines(9);
    let content = lines.join("\r\n");
    let file = write_file(&content);

    for chunk_size in [4, 40, 4096] {
        let mut reader = BatchReader::open(file.path(), 4, "2")
            .await
            .unwrap()
            .with_chunk_size(chunk_size);
        let got: Vec<BetRecord> = read_all(&mut reader).await.into_iter().flatten().collect();
        assert_eq!(got, expected("2", &lines), "chunk_size={}", chunk_size);
    }
}

#[tokio::test]
async fn test_line_longer_than_chunk() {
    let long = format!("{},Apellido,1,2000-01-01,2", "N".repeat(200));
    let content = format!(
        "Ana,Perez,111,1990-01-01,1\r\n{}\r\nJuan,Gomez,222,1985-05-05,2\r\n",
        long
    );
    let file = write_file(&content);

    let mut reader = BatchReader::open(file.path(), 10, "1")
        .await
        .unwrap()
        .with_chunk_size(16);
    let batch = reader.read().await.unwrap();

    assert_eq!(batch.len(), 3);
    assert_eq!(batch[1].first_name.len(), 200);
    assert_eq!(batch[2].document, 222);
}

#[tokio::test]
async fn test_bare_newline_is_line_content_for_any_chunk_size() {
    let content = "Ana,Perez,111,1990-01-01,1\r\n\
                   Maria\nJose,Lopez,555,1991-02-02,5\r\n\
                   Juan,Gomez,222,1985-05-05,2\r";
    let file = write_file(content);

    for chunk_size in 1..=48 {
        let mut reader = BatchReader::open(file.path(), 10, "1")
            .await
            .unwrap()
            .with_chunk_size(chunk_size);
        let got: Vec<BetRecord> = read_all(&mut reader).await.into_iter().flatten().collect();

        assert_eq!(got.len(), 3, "chunk_size={}", chunk_size);
        assert_eq!(got[1].first_name, "Maria\nJose", "chunk_size={}", chunk_size);
        assert_eq!(got[2].number, 2, "chunk_size={}", chunk_size);
    }
}

#[tokio::test]
async fn test_bare_newline_split_fails_for_any_chunk_size() {
    let file = write_file("A,B,1,2000-01-01,7\nC,D,2,2000-01-02,8\r\n");

    for chunk_size in [1, 2, 7, 19, 20, 21, 40, 4096] {
        let mut reader = BatchReader::open(file.path(), 10, "1")
            .await
            .unwrap()
            .with_chunk_size(chunk_size);
        let err = reader.read().await.unwrap_err();
        assert!(
            matches!(err, ClientError::MalformedRecord(_)),
            "chunk_size={}",
            chunk_size
        );
    }
}

#[tokio::test]
async fn test_only_blank_lines() {
    let file = write_file("\r\n   \r\n\r\n");
    let mut reader = BatchReader::open(file.path(), 3, "1").await.unwrap();
    assert!(reader.read().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_line_is_propagated() {
    let file = write_file("Ana,Perez,111,1990-01-01,1\r\nJuan,Gomez,222,1985-05-05\r\n");
    let mut reader = BatchReader::open(file.path(), 5, "1").await.unwrap();

    let err = reader.read().await.unwrap_err();
    assert!(matches!(err, ClientError::MalformedRecord(_)));
}

#[tokio::test]
async fn test_close_releases_file() {
    let file = write_file("Ana,Perez,111,1990-01-01,1\r\nJuan,Gomez,222,1985-05-05,2\r\n");
    let mut reader = BatchReader::open(file.path(), 1, "1").await.unwrap();

    assert_eq!(reader.read().await.unwrap().len(), 1);
    reader.close();
    assert!(reader.is_closed());
    assert!(reader.read().await.unwrap().is_empty());
    // Closing twice is harmless
    reader.close();
}

#[tokio::test]
async fn test_open_errors() {
    let err = BatchReader::open("/nonexistent/agency.csv", 5, "1")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::Io(_)));

    let file = write_file("Ana,Perez,111,1990-01-01,1\r\n");
    let err = BatchReader::open(file.path(), 0, "1").await.err().unwrap();
    assert!(matches!(err, ClientError::Io(_)));

    for agency_id in ["1;2", "1,2"] {
        let err = BatchReader::open(file.path(), 5, agency_id).await.err().unwrap();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
