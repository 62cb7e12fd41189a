use super::error::Error;
use super::query::Query;
use super::source::{StructureSource, record_from_document};
use crate::model::record::StructureRecord;
use reqwest::blocking::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://legacy.materialsproject.org/rest/v2";
pub const DEFAULT_CHUNK_SIZE: usize = 500;

const API_KEY_HEADER: &str = "x-api-key";
const MATERIAL_ID: &str = "material_id";

/// Blocking client for the legacy Materials Project REST interface.
///
/// Requests carry no timeout and are never retried.
#[derive(Debug, Clone)]
pub struct MpRester {
    client: Client,
    api_key: String,
    endpoint: String,
    chunk_size: usize,
}

impl MpRester {
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        let client = Client::builder().timeout(None).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Maximum number of documents requested at once; `0` disables chunking.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// One round trip to the `query` resource, returning the unwrapped response.
trait QueryTransport {
    fn post(
        &self,
        criteria: &Map<String, Value>,
        properties: &[String],
        options: Option<Value>,
    ) -> Result<Value, Error>;
}

impl QueryTransport for MpRester {
    fn post(
        &self,
        criteria: &Map<String, Value>,
        properties: &[String],
        options: Option<Value>,
    ) -> Result<Value, Error> {
        let url = format!("{}/query", self.endpoint.trim_end_matches('/'));
        let mut form = vec![
            ("criteria", serde_json::to_string(criteria)?),
            ("properties", serde_json::to_string(properties)?),
        ];
        if let Some(options) = options {
            form.push(("options", options.to_string()));
        }

        debug!(%url, criteria = %serde_json::Value::Object(criteria.clone()), "posting query");
        let body: Value = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .form(&form)
            .send()?
            .error_for_status()?
            .json()?;

        unwrap_envelope(body)
    }
}

fn count<T: QueryTransport + ?Sized>(
    transport: &T,
    criteria: &Map<String, Value>,
    properties: &[String],
) -> Result<usize, Error> {
    let response = transport.post(criteria, properties, Some(json!({"count_only": true})))?;
    response
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| Error::Payload(format!("expected a document count, found {response}")))
}

fn documents<T: QueryTransport + ?Sized>(
    transport: &T,
    criteria: &Map<String, Value>,
    properties: &[String],
) -> Result<Vec<Map<String, Value>>, Error> {
    into_documents(transport.post(criteria, properties, None)?)
}

fn material_ids<T: QueryTransport + ?Sized>(
    transport: &T,
    criteria: &Map<String, Value>,
) -> Result<Vec<Value>, Error> {
    let docs = documents(transport, criteria, &[MATERIAL_ID.to_string()])?;
    docs.into_iter()
        .enumerate()
        .map(|(i, mut doc)| {
            doc.remove(MATERIAL_ID)
                .ok_or_else(|| Error::malformed(i, format!("missing field '{MATERIAL_ID}'")))
        })
        .collect()
}

/// Runs `query`, splitting it by material id when more than `chunk_size`
/// documents match. Chunk results are concatenated in id order.
fn chunked_documents<T: QueryTransport + ?Sized>(
    transport: &T,
    query: &Query,
    chunk_size: usize,
) -> Result<Vec<Map<String, Value>>, Error> {
    if chunk_size == 0 {
        return documents(transport, &query.criteria, &query.properties);
    }

    let total = count(transport, &query.criteria, &query.properties)?;
    info!(total, chunk_size, "query matched documents");
    if total <= chunk_size {
        return documents(transport, &query.criteria, &query.properties);
    }

    let ids = material_ids(transport, &query.criteria)?;
    let chunks = chunk_criteria(&query.criteria, &ids, chunk_size);
    let n_chunks = chunks.len();

    let mut docs = Vec::with_capacity(ids.len());
    for (i, criteria) in chunks.iter().enumerate() {
        debug!(chunk = i + 1, of = n_chunks, "fetching chunk");
        docs.extend(documents(transport, criteria, &query.properties)?);
    }
    Ok(docs)
}

impl StructureSource for MpRester {
    fn query(&self, query: &Query) -> Result<Vec<StructureRecord>, Error> {
        chunked_documents(self, query, self.chunk_size)?
            .iter()
            .enumerate()
            .map(|(i, doc)| record_from_document(i, doc, &query.target))
            .collect()
    }
}

/// Extracts `response` from `{"valid_response": .., "response": .., "error": ..}`.
pub fn unwrap_envelope(body: Value) -> Result<Value, Error> {
    let Value::Object(mut envelope) = body else {
        return Err(Error::Payload(format!("expected a JSON object, found {body}")));
    };

    let valid = envelope
        .get("valid_response")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !valid {
        let message = match envelope.remove("error") {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => "no error message given".to_string(),
            Some(other) => other.to_string(),
        };
        return Err(Error::Api(message));
    }

    if let Some(Value::String(warning)) = envelope.get("warning") {
        warn!(%warning, "materials database warning");
    }

    envelope
        .remove("response")
        .ok_or_else(|| Error::Payload("envelope has no 'response' field".into()))
}

fn into_documents(response: Value) -> Result<Vec<Map<String, Value>>, Error> {
    let Value::Array(items) = response else {
        return Err(Error::Payload(format!("expected a list of documents, found {response}")));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(doc) => Ok(doc),
            other => Err(Error::malformed(i, format!("expected an object, found {other}"))),
        })
        .collect()
}

/// Copies of `criteria` each restricted to at most `chunk_size` material ids.
fn chunk_criteria(
    criteria: &Map<String, Value>,
    ids: &[Value],
    chunk_size: usize,
) -> Vec<Map<String, Value>> {
    ids.chunks(chunk_size.max(1))
        .map(|chunk| {
            let mut c = criteria.clone();
            c.insert(MATERIAL_ID.to_string(), json!({ "$in": chunk }));
            c
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Request {
        criteria: Map<String, Value>,
        properties: Vec<String>,
        options: Option<Value>,
    }

    /// Answers each post with the next canned response and records the request.
    struct ScriptedTransport {
        responses: RefCell<VecDeque<Value>>,
        requests: RefCell<Vec<Request>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Value>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Request> {
            self.requests.borrow().clone()
        }
    }

    impl QueryTransport for ScriptedTransport {
        fn post(
            &self,
            criteria: &Map<String, Value>,
            properties: &[String],
            options: Option<Value>,
        ) -> Result<Value, Error> {
            self.requests.borrow_mut().push(Request {
                criteria: criteria.clone(),
                properties: properties.to_vec(),
                options,
            });
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| Error::Payload("no scripted response left".into()))
        }
    }

    fn doc(id: &str) -> Value {
        json!({"task_id": id, "full_formula": "Na1Cl1", "final_energy": -1.0,
               "cif": "data_x", "elements": ["Na", "Cl"]})
    }

    #[test]
    fn zero_chunk_size_posts_query_once() {
        let query = Query::stable_ordered("final_energy");
        let transport = ScriptedTransport::new(vec![json!([doc("mp-1"), doc("mp-2")])]);

        let docs = chunked_documents(&transport, &query, 0).unwrap();

        assert_eq!(docs.len(), 2);
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].criteria, query.criteria);
        assert_eq!(requests[0].properties, query.properties);
        assert_eq!(requests[0].options, None);
    }

    #[test]
    fn small_result_is_counted_then_fetched_whole() {
        let query = Query::stable_ordered("final_energy");
        let transport = ScriptedTransport::new(vec![json!(2), json!([doc("mp-1"), doc("mp-2")])]);

        let docs = chunked_documents(&transport, &query, 5).unwrap();

        assert_eq!(docs.len(), 2);
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].options, Some(json!({"count_only": true})));
        assert_eq!(requests[1].options, None);
        assert_eq!(requests[1].criteria, query.criteria);
    }

    #[test]
    fn large_result_is_fetched_in_id_chunks_in_order() {
        let query = Query::stable_ordered("final_energy");
        let transport = ScriptedTransport::new(vec![
            json!(5),
            json!([
                {"material_id": "mp-1"}, {"material_id": "mp-2"}, {"material_id": "mp-3"},
                {"material_id": "mp-4"}, {"material_id": "mp-5"}
            ]),
            json!([doc("mp-1"), doc("mp-2")]),
            json!([doc("mp-3"), doc("mp-4")]),
            json!([doc("mp-5")]),
        ]);

        let docs = chunked_documents(&transport, &query, 2).unwrap();

        let order: Vec<&str> = docs.iter().map(|d| d["task_id"].as_str().unwrap()).collect();
        assert_eq!(order, ["mp-1", "mp-2", "mp-3", "mp-4", "mp-5"]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 5);
        assert_eq!(requests[0].options, Some(json!({"count_only": true})));
        assert_eq!(requests[1].properties, vec!["material_id".to_string()]);
        assert_eq!(requests[1].criteria, query.criteria);
        assert_eq!(requests[2].criteria["material_id"], json!({"$in": ["mp-1", "mp-2"]}));
        assert_eq!(requests[3].criteria["material_id"], json!({"$in": ["mp-3", "mp-4"]}));
        assert_eq!(requests[4].criteria["material_id"], json!({"$in": ["mp-5"]}));
        for r in &requests[2..] {
            assert_eq!(r.properties, query.properties);
            assert_eq!(r.criteria["e_above_hull"], json!(0));
            assert_eq!(r.options, None);
        }
    }

    #[test]
    fn id_listing_without_material_id_is_malformed() {
        let query = Query::stable_ordered("final_energy");
        let transport = ScriptedTransport::new(vec![
            json!(3),
            json!([{"material_id": "mp-1"}, {"task_id": "mp-2"}]),
        ]);

        let err = chunked_documents(&transport, &query, 1).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { index: 1, .. }));
    }

    #[test]
    fn non_numeric_count_is_payload_error() {
        let query = Query::stable_ordered("final_energy");
        let transport = ScriptedTransport::new(vec![json!("many")]);
        assert!(matches!(
            chunked_documents(&transport, &query, 10),
            Err(Error::Payload(_))
        ));
    }

    /// Serves one HTTP response and hands back the raw request text.
    fn serve_once(body: Value) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/rest/v2", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                head.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }
            let mut payload = vec![0; content_length];
            reader.read_exact(&mut payload).unwrap();

            let body = body.to_string();
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            head + &String::from_utf8(payload).unwrap()
        });
        (endpoint, handle)
    }

    #[test]
    fn rester_posts_form_query_with_api_key() {
        let (endpoint, server) = serve_once(json!({
            "valid_response": true,
            "response": [doc("mp-22862")],
        }));
        let rester = MpRester::new("secret-key")
            .unwrap()
            .with_endpoint(endpoint)
            .with_chunk_size(0);

        let records = rester.query(&Query::stable_ordered("final_energy")).unwrap();
        let request = server.join().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].task_id, "mp-22862");
        assert_eq!(records[0].value, Some(-1.0));
        assert!(request.starts_with("POST /rest/v2/query HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("x-api-key: secret-key"));
        assert!(request.contains("criteria="));
        assert!(request.contains("properties="));
        assert!(!request.contains("options="));
    }

    #[test]
    fn envelope_yields_response() {
        let body = json!({"valid_response": true, "response": [{"task_id": "mp-1"}]});
        let response = unwrap_envelope(body).unwrap();
        assert_eq!(response, json!([{"task_id": "mp-1"}]));
    }

    #[test]
    fn invalid_envelope_reports_api_error() {
        let body = json!({"valid_response": false, "error": "API_KEY is not a valid key."});
        let err = unwrap_envelope(body).unwrap_err();
        assert!(matches!(err, Error::Api(msg) if msg.contains("not a valid key")));
    }

    #[test]
    fn non_object_envelope_is_payload_error() {
        assert!(matches!(unwrap_envelope(json!([1, 2])), Err(Error::Payload(_))));
    }

    #[test]
    fn documents_must_be_objects() {
        let err = into_documents(json!([{"a": 1}, 3])).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { index: 1, .. }));
    }

    #[test]
    fn chunks_restrict_material_ids() {
        let criteria = Query::stable_ordered("final_energy").criteria;
        let ids: Vec<Value> = (0..5).map(|i| json!(format!("mp-{i}"))).collect();

        let chunks = chunk_criteria(&criteria, &ids, 2);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0]["material_id"], json!({"$in": ["mp-0", "mp-1"]}));
        assert_eq!(chunks[2]["material_id"], json!({"$in": ["mp-4"]}));
        assert!(chunks.iter().all(|c| c["is_ordered"] == json!(true)));
    }

    #[test]
    fn builder_overrides() {
        let rester = MpRester::new("key")
            .unwrap()
            .with_endpoint("http://localhost:9/rest/v2")
            .with_chunk_size(0);
        assert_eq!(rester.endpoint(), "http://localhost:9/rest/v2");
        assert_eq!(rester.chunk_size, 0);
    }
}
