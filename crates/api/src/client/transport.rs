use std::time::Duration;

use reqwest::{
    blocking::{Client, RequestBuilder},
    Method, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use scheduler_core::{SchedulerError, SchedulerResult};

use crate::error::{decode_error, ErrorBody};

/// 对一个服务基地址的阻塞HTTP调用
///
/// 底层客户端不设整体超时，每个请求按调用方给出的超时单独设置，
/// 这样长等待（领取Worker、执行任务）和短探测可以共用一个连接池。
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    base_url: Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> SchedulerResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SchedulerError::config_error(format!("无效的服务地址 {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SchedulerError::config_error(format!(
                "无效的服务地址: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| SchedulerError::config_error(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        timeout: Option<Duration>,
    ) -> SchedulerResult<T> {
        self.send(self.request(Method::GET, segments, timeout)?)
    }

    pub fn post<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        timeout: Option<Duration>,
    ) -> SchedulerResult<T> {
        self.send(self.request(Method::POST, segments, timeout)?)
    }

    pub fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
        timeout: Option<Duration>,
    ) -> SchedulerResult<T> {
        self.send(self.request(Method::POST, segments, timeout)?.json(body))
    }

    pub fn delete<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        timeout: Option<Duration>,
    ) -> SchedulerResult<T> {
        self.send(self.request(Method::DELETE, segments, timeout)?)
    }

    /// 构造请求；路径片段逐段编码，ID中的特殊字符不会改变路由
    pub fn request(
        &self,
        method: Method,
        segments: &[&str],
        timeout: Option<Duration>,
    ) -> SchedulerResult<RequestBuilder> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SchedulerError::config_error(format!("无效的服务地址: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        let request = self.client.request(method, url);
        Ok(match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        })
    }

    /// 发送请求并取出响应中的 `data`
    ///
    /// 传输层失败（连接、超时、读取响应体）一律视为连通性错误。
    pub fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> SchedulerResult<T> {
        let response = request.send().map_err(|e| {
            warn!("请求 {} 失败: {}", self.base_url, e);
            SchedulerError::connectivity(e.to_string())
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .map_err(|e| SchedulerError::connectivity(format!("读取响应失败: {e}")))?;
        let payload: Option<Value> = serde_json::from_slice(&body).ok();

        if !status.is_success() {
            let error = payload
                .and_then(|mut value| value.get_mut("error").map(Value::take))
                .and_then(|error| serde_json::from_value::<ErrorBody>(error).ok());
            debug!("{} 返回错误状态 {}", self.base_url, status);
            return Err(decode_error(status, error));
        }

        let mut payload = payload.ok_or_else(|| {
            SchedulerError::Serialization(format!("{} 返回了非JSON响应", self.base_url))
        })?;
        let data = payload
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);
        serde_json::from_value(data)
            .map_err(|e| SchedulerError::Serialization(format!("解析响应数据失败: {e}")))
    }
}
