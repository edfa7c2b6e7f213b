//! pass-through write アダプタ

use std::io;

use crate::channel::ByteChannel;

/// outbound チャンネル上の `std::io::Write` 実装
///
/// 書き込みはそのまま outbound に積まれ、次のホスト側 drain で見える。
/// ブロックせず、部分書き込みもしない。ホストが drain しない限り
/// バッファは伸び続ける（背圧なし）。
#[derive(Debug, Clone)]
pub struct PassthroughWriter {
    channel: ByteChannel,
}

impl PassthroughWriter {
    pub fn new(channel: ByteChannel) -> Self {
        PassthroughWriter { channel }
    }
}

impl io::Write for PassthroughWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.channel.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_write_is_visible_to_next_drain() {
        let ch = ByteChannel::new("outbound");
        let mut writer = PassthroughWriter::new(ch.clone());

        assert_eq!(writer.write(b"frame-1").unwrap(), 7);
        writer.write_all(b"/frame-2").unwrap();
        writer.flush().unwrap();

        assert_eq!(ch.drain_all(), b"frame-1/frame-2");
        // 続けて drain すると空
        assert!(ch.drain_all().is_empty());
    }

    #[test]
    fn test_write_without_drain_accumulates() {
        let ch = ByteChannel::new("outbound");
        let mut writer = PassthroughWriter::new(ch.clone());
        for _ in 0..1000 {
            writer.write_all(b"0123456789").unwrap();
        }
        assert_eq!(ch.len(), 10_000);
    }
}
