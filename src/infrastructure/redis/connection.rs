// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Minimal RESP2 client over a tokio TCP stream.

use crate::shared::error::{RedisKubeError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Upper bound for a single bulk reply; INFO output is a few KiB.
const MAX_BULK_SIZE: usize = 16 * 1024 * 1024;
/// Upper bound for the element count of an array reply.
const MAX_ARRAY_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Text content of a simple or bulk reply.
    pub fn into_text(self) -> Result<String> {
        match self {
            RespValue::Simple(s) => Ok(s),
            RespValue::Bulk(Some(bytes)) => String::from_utf8(bytes)
                .map_err(|e| RedisKubeError::Protocol(format!("reply is not UTF-8: {}", e))),
            RespValue::Error(e) => Err(RedisKubeError::Protocol(e)),
            other => Err(RedisKubeError::Protocol(format!(
                "unexpected reply: {:?}",
                other
            ))),
        }
    }
}

pub fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut buf = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

pub struct RespConnection {
    stream: BufReader<TcpStream>,
    io_timeout: Duration,
}

impl RespConnection {
    pub async fn connect(
        address: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| RedisKubeError::Timeout(format!("connecting to {}", address)))??;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream: BufReader::new(stream),
            io_timeout,
        })
    }

    /// Sends one command and waits for its reply. Error replies become `Protocol` errors.
    pub async fn command(&mut self, args: &[&str]) -> Result<RespValue> {
        let name = args.first().copied().unwrap_or_default();
        let io_timeout = self.io_timeout;

        let reply = timeout(io_timeout, async {
            let stream = self.stream.get_mut();
            stream.write_all(&encode_command(args)).await?;
            stream.flush().await?;
            read_value(&mut self.stream).await
        })
        .await
        .map_err(|_| RedisKubeError::Timeout(format!("waiting for {} reply", name)))??;

        match reply {
            RespValue::Error(e) => Err(RedisKubeError::Protocol(format!("{}: {}", name, e))),
            other => Ok(other),
        }
    }

    pub async fn auth(&mut self, password: &str) -> Result<()> {
        self.command(&["AUTH", password]).await?;
        Ok(())
    }
}

fn read_value(stream: &mut BufReader<TcpStream>) -> BoxFuture<'_, Result<RespValue>> {
    async move {
        let line = read_line(stream).await?;
        let mut chars = line.chars();
        let kind = chars.next();
        let rest = chars.as_str();

        match kind {
            Some('+') => Ok(RespValue::Simple(rest.to_string())),
            Some('-') => Ok(RespValue::Error(rest.to_string())),
            Some(':') => Ok(RespValue::Integer(parse_len(rest)?)),
            Some('$') => {
                let len = parse_len(rest)?;
                if len < 0 {
                    return Ok(RespValue::Bulk(None));
                }
                let len = len as usize;
                if len > MAX_BULK_SIZE {
                    return Err(RedisKubeError::Protocol(format!(
                        "bulk reply too large: {} bytes",
                        len
                    )));
                }
                let mut buf = vec![0u8; len + 2];
                stream.read_exact(&mut buf).await?;
                buf.truncate(len);
                Ok(RespValue::Bulk(Some(buf)))
            }
            Some('*') => {
                let len = parse_len(rest)?;
                if len < 0 {
                    return Ok(RespValue::Array(None));
                }
                let len = len as usize;
                if len > MAX_ARRAY_LEN {
                    return Err(RedisKubeError::Protocol(format!(
                        "array reply too large: {} elements",
                        len
                    )));
                }
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(read_value(stream).await?);
                }
                Ok(RespValue::Array(Some(items)))
            }
            _ => Err(RedisKubeError::Protocol(format!(
                "unknown reply type in '{}'",
                line
            ))),
        }
    }
    .boxed()
}

async fn read_line(stream: &mut BufReader<TcpStream>) -> Result<String> {
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;
    if n == 0 {
        return Err(RedisKubeError::Protocol(
            "connection closed by server".to_string(),
        ));
    }

    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(RedisKubeError::Protocol("empty reply line".to_string()));
    }
    Ok(line.to_string())
}

fn parse_len(s: &str) -> Result<i64> {
    s.parse::<i64>()
        .map_err(|_| RedisKubeError::Protocol(format!("invalid length '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accepts one connection, reads one request and answers with `reply`.
    async fn serve_once(reply: &'static [u8]) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(reply).await.unwrap();
            buf.truncate(n);
            buf
        });

        (addr, handle)
    }

    async fn connect(addr: &str) -> RespConnection {
        RespConnection::connect(addr, Duration::from_secs(1), Duration::from_secs(1))
            .await
            .unwrap()
    }

    #[test]
    fn test_encode_command() {
        assert_eq!(
            encode_command(&["INFO", "replication"]),
            b"*2\r\n$4\r\nINFO\r\n$11\r\nreplication\r\n".to_vec()
        );
    }

    #[tokio::test]
    async fn test_bulk_reply() {
        let (addr, server) = serve_once(b"$11\r\nrole:master\r\n").await;
        let mut conn = connect(&addr).await;

        let reply = conn.command(&["INFO", "replication"]).await.unwrap();
        assert_eq!(reply.into_text().unwrap(), "role:master");

        let request = server.await.unwrap();
        assert_eq!(request, encode_command(&["INFO", "replication"]));
    }

    #[tokio::test]
    async fn test_error_reply() {
        let (addr, _server) = serve_once(b"-NOAUTH Authentication required.\r\n").await;
        let mut conn = connect(&addr).await;

        let err = conn.command(&["INFO", "replication"]).await.unwrap_err();
        assert!(matches!(err, RedisKubeError::Protocol(ref msg) if msg.contains("NOAUTH")));
    }

    #[tokio::test]
    async fn test_array_reply() {
        let (addr, _server) = serve_once(b"*2\r\n+OK\r\n:42\r\n").await;
        let mut conn = connect(&addr).await;

        let reply = conn.command(&["ROLE"]).await.unwrap();
        assert_eq!(
            reply,
            RespValue::Array(Some(vec![
                RespValue::Simple("OK".to_string()),
                RespValue::Integer(42)
            ]))
        );
    }

    #[tokio::test]
    async fn test_oversized_array_header_is_rejected() {
        let (addr, _server) = serve_once(b"*4611686018427387904\r\n").await;
        let mut conn = connect(&addr).await;

        let err = conn.command(&["INFO", "replication"]).await.unwrap_err();
        assert!(matches!(err, RedisKubeError::Protocol(ref msg) if msg.contains("too large")));
    }

    #[tokio::test]
    async fn test_reply_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut conn =
            RespConnection::connect(&addr, Duration::from_secs(1), Duration::from_millis(100))
                .await
                .unwrap();
        let err = conn.command(&["PING"]).await.unwrap_err();
        assert!(matches!(err, RedisKubeError::Timeout(_)));
    }
}
