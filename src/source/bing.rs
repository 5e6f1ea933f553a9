// bing.rs — Bing 每日图片归档客户端
// 负责请求 HPImageArchive 的 XML 元数据，并以流式方式下载 UHD 原图

use super::{ImageArchive, ImageEntry};
use crate::error::BingError;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// 默认元数据接口
pub const DEFAULT_ENDPOINT: &str = "http://cn.bing.com/HPImageArchive.aspx";

/// `<url>` 中的相对路径需要拼上的主机名
pub const DEFAULT_IMAGE_HOST: &str = "http://www.bing.com";

/// 元数据里默认给出的 1080p 标记
const FHD_TAG: &str = "_1920x1080";

/// 替换后请求最高分辨率
const UHD_TAG: &str = "_UHD";

/// Bing 图片归档客户端
///
/// `reqwest::Client` 内部带连接池，整个运行期间只创建一个。
pub struct BingClient {
    client: reqwest::Client,
    endpoint: String,
    image_host: String,
}

impl BingClient {
    /// # 参数
    /// - `endpoint`: 元数据接口地址（不含查询参数）
    /// - `image_host`: 拼接相对图片路径用的主机名
    pub fn new(endpoint: impl Into<String>, image_host: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, image_host)
    }

    /// 使用外部构建好的 `reqwest::Client`（如需自定义代理、超时）
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        image_host: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            image_host: image_host.into(),
        }
    }

    /// 构建元数据请求：`?format=xml&idx=<index>&n=<days>`
    fn archive_request(&self, index: u32, days: u32) -> Result<reqwest::Request, BingError> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "xml")])
            .query(&[("idx", index), ("n", days)])
            .build()?;
        Ok(request)
    }

    /// 把响应体逐块写入 `path`
    async fn stream_to(&self, url: &str, path: &Path) -> Result<(), BingError> {
        // error_for_status() 把 4xx/5xx 转成 reqwest::Error，经 ? 变为 BingError::Network
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        // 状态码确认无误后才创建文件，失败的请求不会在磁盘上留下任何东西
        let mut file = File::create(path).await.map_err(|e| BingError::fs(path, e))?;
        let mut written = 0usize;
        // chunk() 每次返回一段响应体，读完返回 None，不必把整张图片放进内存
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| BingError::fs(path, e))?;
            written += chunk.len();
        }
        // tokio 的 File 写入是异步缓冲的，改名前必须 flush
        file.flush().await.map_err(|e| BingError::fs(path, e))?;

        tracing::debug!(url, bytes = written, "asset downloaded");
        Ok(())
    }
}

#[async_trait]
impl ImageArchive for BingClient {
    async fn fetch_metadata(&self, index: u32, days: u32) -> Result<Vec<ImageEntry>, BingError> {
        let request = self.archive_request(index, days)?;
        tracing::debug!(url = %request.url(), "fetching image archive");

        let body = self
            .client
            .execute(request)
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        parse_archive(&body, &self.image_host)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), BingError> {
        let url = uhd_url(url);
        // 先写 .part，完整后再改名，避免半截文件被当作缓存
        let partial = partial_path(dest);

        let result = match self.stream_to(&url, &partial).await {
            Ok(()) => tokio::fs::rename(&partial, dest)
                .await
                .map_err(|e| BingError::fs(dest, e)),
            Err(err) => Err(err),
        };

        // 出错时删除残留的 .part；文件可能根本没创建，删除失败可以忽略
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }
}

/// 请求 UHD 版本：把所有 `_1920x1080` 换成 `_UHD`，没有该标记则原样返回
pub fn uhd_url(url: &str) -> String {
    url.replace(FHD_TAG, UHD_TAG)
}

/// 把 `<url>` 中的相对路径补全为绝对地址
pub fn resolve_url(image_host: &str, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }
    let host = image_host.trim_end_matches('/');
    if relative.starts_with('/') {
        format!("{host}{relative}")
    } else {
        format!("{host}/{relative}")
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn is_start_date(value: &str) -> bool {
    value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())
}

/// `<image>` 内部关心的子元素
#[derive(Clone, Copy)]
enum Field {
    StartDate,
    Url,
    Copyright,
}

#[derive(Default)]
struct EntryBuilder {
    start_date: Option<String>,
    url: Option<String>,
    copyright: Option<String>,
}

impl EntryBuilder {
    fn build(self, image_host: &str) -> Result<ImageEntry, BingError> {
        let start_date = self
            .start_date
            .ok_or_else(|| BingError::Parse("<image> without <startdate>".to_string()))?;
        if !is_start_date(&start_date) {
            return Err(BingError::Parse(format!(
                "invalid <startdate> '{start_date}', expected 8 digits"
            )));
        }
        let url = self
            .url
            .ok_or_else(|| BingError::Parse(format!("<image> {start_date} without <url>")))?;

        Ok(ImageEntry {
            url: resolve_url(image_host, &url),
            start_date,
            copyright: self.copyright,
        })
    }
}

/// 解析 HPImageArchive 返回的 XML，按文档顺序返回所有 `<image>`
pub fn parse_archive(xml: &[u8], image_host: &str) -> Result<Vec<ImageEntry>, BingError> {
    let mut reader = Reader::from_reader(xml);
    // 去掉元素之间的换行和缩进，只保留有意义的文本
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    // 正在收集的 <image>，以及当前所在的子元素
    let mut current: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;
    // quick-xml 在 EOF 时不检查未闭合的标签，自己计数
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                saw_root = true;
                field = None;
                match e.name().as_ref() {
                    b"image" => current = Some(EntryBuilder::default()),
                    b"startdate" => field = Some(Field::StartDate),
                    b"url" => field = Some(Field::Url),
                    b"copyright" => field = Some(Field::Copyright),
                    _ => {}
                }
            }
            // 自闭合的 <image/> 没有任何子元素，和缺少 <startdate> 一样视为格式错误
            Ok(Event::Empty(e)) => {
                saw_root = true;
                if e.name().as_ref() == b"image" {
                    return Err(BingError::Parse("empty <image/> element".to_string()));
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                field = None;
                // </image> 结束时校验并生成条目，任何一条不完整都让整个文档失败
                if e.name().as_ref() == b"image" {
                    if let Some(builder) = current.take() {
                        entries.push(builder.build(image_host)?);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                // 只关心 <image> 内 startdate/url/copyright 的文本，unescape 还原 &amp; 等实体
                if let (Some(builder), Some(f)) = (current.as_mut(), field) {
                    let text = e
                        .unescape()
                        .map_err(|err| BingError::Parse(format!("bad text content: {err}")))?
                        .into_owned();
                    match f {
                        Field::StartDate => builder.start_date = Some(text),
                        Field::Url => builder.url = Some(text),
                        Field::Copyright => builder.copyright = Some(text),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(BingError::Parse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(BingError::Parse("document has no root element".to_string()));
    }
    if depth != 0 || current.is_some() {
        return Err(BingError::Parse("unexpected end of document".to_string()));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCHIVE: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<images>
  <image>
    <startdate>20240115</startdate>
    <fullstartdate>202401151600</fullstartdate>
    <enddate>20240116</enddate>
    <url>/th?id=OHR.Foo_1920x1080.jpg&amp;rf=LaDigue_1920x1080.jpg&amp;pid=hp</url>
    <urlBase>/th?id=OHR.Foo</urlBase>
    <copyright>Foo Bay (© Someone)</copyright>
    <hotspots></hotspots>
  </image>
  <image>
    <startdate>20240114</startdate>
    <url>/th?id=OHR.Bar_1920x1080.jpg</url>
  </image>
  <tooltips>
    <loadMessage><message>Loading...</message></loadMessage>
  </tooltips>
</images>"#;

    #[test]
    fn test_parse_archive_in_document_order() {
        let entries = parse_archive(ARCHIVE.as_bytes(), DEFAULT_IMAGE_HOST).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].start_date, "20240115");
        assert_eq!(
            entries[0].url,
            "http://www.bing.com/th?id=OHR.Foo_1920x1080.jpg&rf=LaDigue_1920x1080.jpg&pid=hp"
        );
        assert_eq!(entries[0].copyright.as_deref(), Some("Foo Bay (© Someone)"));

        assert_eq!(entries[1].start_date, "20240114");
        assert_eq!(entries[1].url, "http://www.bing.com/th?id=OHR.Bar_1920x1080.jpg");
        assert_eq!(entries[1].copyright, None);
    }

    #[test]
    fn test_parse_archive_without_images() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><images></images>"#;
        let entries = parse_archive(xml.as_bytes(), DEFAULT_IMAGE_HOST).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_archive_rejects_empty_image() {
        let xml = "<images><image/><image><startdate>20240115</startdate><url>/a.jpg</url></image></images>";
        let err = parse_archive(xml.as_bytes(), DEFAULT_IMAGE_HOST).unwrap_err();
        assert!(matches!(err, BingError::Parse(_)));
    }

    #[test]
    fn test_parse_archive_missing_url() {
        let xml = "<images><image><startdate>20240115</startdate></image></images>";
        let err = parse_archive(xml.as_bytes(), DEFAULT_IMAGE_HOST).unwrap_err();
        assert!(matches!(err, BingError::Parse(_)));
    }

    #[test]
    fn test_parse_archive_rejects_bad_start_date() {
        let xml = "<images><image><startdate>../../etc</startdate><url>/x.jpg</url></image></images>";
        let err = parse_archive(xml.as_bytes(), DEFAULT_IMAGE_HOST).unwrap_err();
        assert!(err.to_string().contains("startdate"));
    }

    #[test]
    fn test_parse_archive_malformed() {
        let mismatched = "<images><image></images>";
        assert!(matches!(
            parse_archive(mismatched.as_bytes(), DEFAULT_IMAGE_HOST),
            Err(BingError::Parse(_))
        ));

        let truncated = "<images><image><startdate>20240115</startdate>";
        assert!(matches!(
            parse_archive(truncated.as_bytes(), DEFAULT_IMAGE_HOST),
            Err(BingError::Parse(_))
        ));

        let not_xml = "Service Unavailable";
        assert!(matches!(
            parse_archive(not_xml.as_bytes(), DEFAULT_IMAGE_HOST),
            Err(BingError::Parse(_))
        ));
    }

    #[test]
    fn test_resolved_download_url_prefers_uhd() {
        let url = resolve_url(DEFAULT_IMAGE_HOST, "/th?id=OHR.Foo_1920x1080.jpg");
        assert_eq!(uhd_url(&url), "http://www.bing.com/th?id=OHR.Foo_UHD.jpg");
    }

    #[test]
    fn test_uhd_url_without_marker_is_unchanged() {
        let url = "http://www.bing.com/th?id=OHR.Foo_1366x768.jpg";
        assert_eq!(uhd_url(url), url);
    }

    #[test]
    fn test_resolve_url_variants() {
        assert_eq!(
            resolve_url("http://www.bing.com/", "/az/hprichbg/x.jpg"),
            "http://www.bing.com/az/hprichbg/x.jpg"
        );
        assert_eq!(
            resolve_url("http://www.bing.com", "az/x.jpg"),
            "http://www.bing.com/az/x.jpg"
        );
        assert_eq!(
            resolve_url("http://www.bing.com", "https://cdn.example.com/x.jpg"),
            "https://cdn.example.com/x.jpg"
        );
    }

    #[test]
    fn test_archive_request_query() {
        let client = BingClient::new(DEFAULT_ENDPOINT, DEFAULT_IMAGE_HOST);
        let request = client.archive_request(2, 3).unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://cn.bing.com/HPImageArchive.aspx?format=xml&idx=2&n=3"
        );
    }

    #[test]
    fn test_partial_path() {
        let dest = Path::new("/data/images/20240115.jpg");
        assert_eq!(partial_path(dest), PathBuf::from("/data/images/20240115.jpg.part"));
    }

    /// 在 127.0.0.1 上起一个只应答一次的 HTTP 服务，返回其基础地址
    async fn serve_once(response: Vec<u8>) -> String {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // GET 请求没有请求体，读到头部结束即可
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(&response).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn http_response(status: &str, content_length: usize, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {content_length}\r\nConnection: close\r\n\r\n"
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    /// 测试里不走系统代理，直接连本地服务
    fn local_client(base: &str) -> BingClient {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        BingClient::with_client(client, format!("{base}/HPImageArchive.aspx"), base)
    }

    #[tokio::test]
    async fn test_download_writes_file_and_removes_part() {
        let body = b"\xff\xd8 jpeg bytes";
        let base = serve_once(http_response("200 OK", body.len(), body)).await;
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("20240115.jpg");

        local_client(&base)
            .download(&format!("{base}/th?id=OHR.Foo_1920x1080.jpg"), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_not_found_leaves_nothing() {
        let base = serve_once(http_response("404 Not Found", 0, b"")).await;
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("20240115.jpg");

        let err = local_client(&base)
            .download(&format!("{base}/th?id=OHR.Missing_1920x1080.jpg"), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, BingError::Network(_)));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_truncated_body_is_cleaned_up() {
        // 声明 1000 字节却只发 10 字节就断开连接
        let base = serve_once(http_response("200 OK", 1000, b"0123456789")).await;
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("20240115.jpg");

        let err = local_client(&base)
            .download(&format!("{base}/th?id=OHR.Foo_1920x1080.jpg"), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, BingError::Network(_)));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_fetch_metadata_server_error() {
        let base = serve_once(http_response("500 Internal Server Error", 0, b"")).await;

        let err = local_client(&base).fetch_metadata(0, 1).await.unwrap_err();

        assert!(matches!(err, BingError::Network(_)));
    }

    #[tokio::test]
    async fn test_fetch_metadata_parses_response() {
        let base = serve_once(http_response("200 OK", ARCHIVE.len(), ARCHIVE.as_bytes())).await;

        let entries = local_client(&base).fetch_metadata(0, 2).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start_date, "20240115");
        assert!(entries[0].url.starts_with(&base));
    }
}
