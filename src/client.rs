use std::path::Path;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::config::{ClientOptions, Credentials};
use crate::descriptor::QueryDescriptor;
use crate::download::{DownloadReport, Progress, TextProgress, stream_to_file};
use crate::error::{Error, Result};
use crate::status::{PollBudget, wait_until_complete};

/// Server-side handle for an accepted data query, polled until ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
}

/// Server-side handle for a single file-download authorization.
///
/// Carries the result's filename and size so downloads pair with results by
/// key, never by list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub filename: String,
    pub size: u64,
}

/// One remote file from a completed job's result listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFile {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
    #[serde(default)]
    pub product_info: Option<ProductInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub product_start_date: Option<String>,
    #[serde(default)]
    pub product_end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultPage {
    #[serde(default)]
    content: Vec<ResultFile>,
    #[serde(default)]
    next_page: Option<String>,
}

/// Blocking client for the HDA broker.
///
/// Options and credentials are fixed at construction; the only mutable state
/// is the bearer token fetched by [`Client::authenticate`]. Every other stage
/// returns an explicit value ([`Job`], [`Order`], [`DownloadReport`]) that the
/// caller hands to the next stage.
#[derive(Debug, Clone)]
pub struct Client {
    opts: ClientOptions,
    creds: Credentials,
    base_url: String,
    http: HttpClient,
    token: Option<String>,
}

impl Client {
    pub fn new(opts: ClientOptions, creds: Credentials) -> Result<Self> {
        // Validate early; a bad base URL should not surface as a mid-pipeline
        // request error.
        Url::parse(&opts.broker_url)?;
        let base_url = opts.broker_url.trim_end_matches('/').to_string();

        std::fs::create_dir_all(&opts.download_dir)?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("wekeo-hda-rs/0.1"));

        let mut builder = HttpClient::builder().default_headers(headers);
        if !opts.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self {
            opts,
            creds,
            base_url,
            http,
            token: None,
        })
    }

    /// `new` followed by `authenticate`.
    pub fn connect(opts: ClientOptions, creds: Credentials) -> Result<Self> {
        let mut client = Self::new(opts, creds)?;
        client.authenticate()?;
        Ok(client)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<&str> {
        self.token.as_deref().ok_or(Error::NotAuthenticated)
    }

    fn poll_budget(&self) -> PollBudget {
        PollBudget {
            interval: self.opts.poll_interval,
            timeout: self.opts.poll_timeout,
            max_attempts: self.opts.poll_max_attempts,
        }
    }

    /// Exchange the API key for a bearer token (`GET /gettoken`).
    pub fn authenticate(&mut self) -> Result<()> {
        let v: serde_json::Value = self
            .http
            .get(self.endpoint("gettoken"))
            .header(AUTHORIZATION, format!("Basic {}", self.creds.api_key()))
            .send()?
            .error_for_status()?
            .json()?;

        let token = v
            .get("access_token")
            .and_then(|x| x.as_str())
            .ok_or(Error::MissingField("access_token"))?;

        debug!(user = %self.creds.username, "token obtained");
        self.token = Some(token.to_string());
        Ok(())
    }

    /// `GET /termsaccepted/{licenseId}`.
    pub fn terms_accepted(&self, license: &str) -> Result<bool> {
        let v: serde_json::Value = self
            .http
            .get(self.endpoint(&format!("termsaccepted/{license}")))
            .bearer_auth(self.bearer()?)
            .send()?
            .error_for_status()?
            .json()?;

        v.get("accepted")
            .and_then(|x| x.as_bool())
            .ok_or(Error::MissingField("accepted"))
    }

    /// `PUT /termsaccepted/{licenseId}`; returns the acceptance flag the
    /// broker reports back.
    pub fn accept_terms(&self, license: &str) -> Result<bool> {
        let v: serde_json::Value = self
            .http
            .put(self.endpoint(&format!("termsaccepted/{license}")))
            .bearer_auth(self.bearer()?)
            .json(&json!({ "accepted": true }))
            .send()?
            .error_for_status()?
            .json()?;

        v.get("accepted")
            .and_then(|x| x.as_bool())
            .ok_or(Error::MissingField("accepted"))
    }

    /// Accept the licence terms if not yet accepted; fails if the broker does
    /// not record the acceptance.
    pub fn ensure_terms(&self, license: &str) -> Result<()> {
        if self.terms_accepted(license)? {
            return Ok(());
        }
        info!(license, "accepting terms of use");
        if self.accept_terms(license)? {
            Ok(())
        } else {
            Err(Error::TermsNotAccepted(license.to_string()))
        }
    }

    /// `GET /querymetadata/{datasetId}`: raw metadata for a dataset.
    pub fn query_metadata(&self, dataset_id: &str) -> Result<serde_json::Value> {
        let v = self
            .http
            .get(self.endpoint(&format!("querymetadata/{dataset_id}")))
            .bearer_auth(self.bearer()?)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(v)
    }

    /// `POST /datarequest`: submit a query descriptor, returning its [`Job`].
    pub fn submit_request(&self, descriptor: &QueryDescriptor) -> Result<Job> {
        descriptor.validate()?;

        let v: serde_json::Value = self
            .http
            .post(self.endpoint("datarequest"))
            .bearer_auth(self.bearer()?)
            .json(descriptor)
            .send()?
            .error_for_status()?
            .json()?;

        let id = v
            .get("jobId")
            .and_then(|x| x.as_str())
            .ok_or(Error::MissingField("jobId"))?;

        info!(dataset = %descriptor.dataset_id, job = id, "data request submitted");
        Ok(Job { id: id.to_string() })
    }

    /// One status probe (`GET /datarequest/status/{jobId}`), as the raw string.
    pub fn job_status(&self, job: &Job) -> Result<String> {
        let v: serde_json::Value = self
            .http
            .get(self.endpoint(&format!("datarequest/status/{}", job.id)))
            .bearer_auth(self.bearer()?)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(v.get("status")
            .and_then(|x| x.as_str())
            .ok_or(Error::MissingField("status"))?
            .to_string())
    }

    /// Poll the job on a fixed interval until it completes.
    pub fn wait_for_job(&self, job: &Job) -> Result<()> {
        wait_until_complete("job", &job.id, self.poll_budget(), || self.job_status(job))?;
        Ok(())
    }

    /// `GET /datarequest/jobs/{jobId}/result`, following pagination links.
    pub fn list_results(&self, job: &Job) -> Result<Vec<ResultFile>> {
        let mut url = self.endpoint(&format!("datarequest/jobs/{}/result", job.id));
        let mut files = Vec::new();

        loop {
            let page: ResultPage = self
                .http
                .get(&url)
                .bearer_auth(self.bearer()?)
                .send()?
                .error_for_status()?
                .json()?;

            files.extend(page.content);

            match page.next_page {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }

        debug!(job = %job.id, files = files.len(), "result listing complete");
        Ok(files)
    }

    /// `POST /dataorder`: authorize the download of one result file.
    pub fn create_order(&self, job: &Job, file: &ResultFile) -> Result<Order> {
        let v: serde_json::Value = self
            .http
            .post(self.endpoint("dataorder"))
            .bearer_auth(self.bearer()?)
            .json(&json!({ "jobId": job.id, "uri": file.url }))
            .send()?
            .error_for_status()?
            .json()?;

        let id = v
            .get("orderId")
            .and_then(|x| x.as_str())
            .ok_or(Error::MissingField("orderId"))?;

        debug!(order = id, file = %file.filename, "order placed");
        Ok(Order {
            id: id.to_string(),
            filename: file.filename.clone(),
            size: file.size,
        })
    }

    /// One status probe (`GET /dataorder/status/{orderId}`), as the raw string.
    pub fn order_status(&self, order: &Order) -> Result<String> {
        let v: serde_json::Value = self
            .http
            .get(self.endpoint(&format!("dataorder/status/{}", order.id)))
            .bearer_auth(self.bearer()?)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(v.get("status")
            .and_then(|x| x.as_str())
            .ok_or(Error::MissingField("status"))?
            .to_string())
    }

    /// Poll the order on a fixed interval until it completes.
    pub fn wait_for_order(&self, order: &Order) -> Result<()> {
        wait_until_complete("order", &order.id, self.poll_budget(), || {
            self.order_status(order)
        })?;
        Ok(())
    }

    /// Stream `GET /dataorder/download/{orderId}` to the download directory,
    /// with textual progress on stderr.
    pub fn download_order(&self, order: &Order) -> Result<DownloadReport> {
        let mut progress = TextProgress::new();
        self.download_order_with(order, &mut progress)
    }

    pub fn download_order_with(
        &self,
        order: &Order,
        progress: &mut dyn Progress,
    ) -> Result<DownloadReport> {
        let resp = self
            .http
            .get(self.endpoint(&format!("dataorder/download/{}", order.id)))
            .bearer_auth(self.bearer()?)
            .send()?
            .error_for_status()?;

        let expected = resp
            .content_length()
            .filter(|n| *n > 0)
            .or((order.size > 0).then_some(order.size));

        // Keep only the final path component of whatever name the broker sent.
        let name = Path::new(&order.filename)
            .file_name()
            .ok_or(Error::MissingField("filename"))?;
        let dest = self.opts.download_dir.join(name);

        info!(order = %order.id, file = %name.to_string_lossy(), "downloading");
        stream_to_file(resp, &dest, expected, progress)
    }

    /// Download each order in turn, strictly sequentially.
    pub fn download_all(&self, orders: &[Order]) -> Result<Vec<DownloadReport>> {
        let mut reports = Vec::with_capacity(orders.len());
        for order in orders {
            reports.push(self.download_order(order)?);
        }
        Ok(reports)
    }

    /// The whole pipeline: authenticate (if needed), submit the descriptor,
    /// wait for the job, then order, wait for, and download every result file.
    pub fn retrieve(&mut self, descriptor: &QueryDescriptor) -> Result<Vec<DownloadReport>> {
        if self.token.is_none() {
            self.authenticate()?;
        }

        let job = self.submit_request(descriptor)?;
        self.wait_for_job(&job)?;

        let files = self.list_results(&job)?;
        info!(job = %job.id, files = files.len(), "job completed");

        let mut orders = Vec::with_capacity(files.len());
        for file in &files {
            let order = self.create_order(&job, file)?;
            self.wait_for_order(&order)?;
            orders.push(order);
        }

        self.download_all(&orders)
    }
}
