use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, info, trace};
use xt_xsd::{
    CompiledSchema, FieldDescriptor, FieldValueError, LogicalKind, RecordShape,
    SchemaCompilationError, ShapeName, TypedRecord,
};

use crate::{
    config::FromXmlConfig,
    error::{ApplyError, ConfigureError, PayloadTypeError, RecordError},
    record::{Data, Record, Schema, Side},
    resolver::{default_resolvers, load_sources, SchemaResolver},
};

/// Field of the fallback shape holding the payload that failed to convert.
pub const BAD_PAYLOAD_FIELD: &str = "badPayload";

const FALLBACK_DOC: &str = "Payload of a record that could not be converted from XML";

/// A per-record transformation with an explicit configure/close lifecycle.
///
/// `apply` may be called from any number of threads at once; `close` may overlap in-flight
/// `apply` calls as long as no new ones start afterwards.
pub trait Transformation: Send + Sync {
    fn configure(&mut self, settings: &HashMap<String, String>) -> Result<(), ConfigureError>;

    fn apply(&self, record: &Record) -> Result<Record, ApplyError>;

    /// Idempotent.
    fn close(&self);
}

enum State {
    Unconfigured,
    Configured(Arc<Configured>),
    Closed,
}

/// Parses payload text; holds the parsing options fixed at configuration.
#[derive(Copy, Clone, Debug)]
pub struct XmlParser {
    allow_dtd: bool,
}

impl XmlParser {
    pub fn new(allow_dtd: bool) -> Self {
        Self { allow_dtd }
    }

    pub fn parse<'input>(
        &self,
        text: &'input str,
    ) -> Result<roxmltree::Document<'input>, roxmltree::Error> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: self.allow_dtd,
            ..roxmltree::ParsingOptions::default()
        };
        roxmltree::Document::parse_with_options(text, options)
    }
}

struct Reroute {
    topic: String,
    shape: Arc<RecordShape>,
}

impl Reroute {
    fn new(topic: &str, shape_name: &str) -> Result<Self, SchemaCompilationError> {
        let shape = RecordShape::new(
            ShapeName::parse(shape_name),
            Some(FALLBACK_DOC.to_string()),
            vec![FieldDescriptor::new(BAD_PAYLOAD_FIELD, LogicalKind::String)],
        )?;
        Ok(Self {
            topic: topic.to_string(),
            shape: Arc::new(shape),
        })
    }

    /// `record` sent to the reroute topic with `side` replaced by its text in the fallback shape.
    fn wrap(&self, record: &Record, side: Side) -> Result<Record, FieldValueError> {
        let mut bad = TypedRecord::new(self.shape.clone());
        bad.put(BAD_PAYLOAD_FIELD, record.data(side).to_text())?;
        Ok(record
            .with_side(side, Some(Schema::Struct(self.shape.clone())), Data::Struct(bad))
            .with_topic(self.topic.as_str()))
    }
}

/// Everything `apply` needs, immutable after `configure`.
struct Configured {
    schema: Arc<CompiledSchema>,
    parser: XmlParser,
    reroute: Option<Reroute>,
}

impl Configured {
    fn convert(&self, side: Side, data: &Data) -> Result<TypedRecord, RecordError> {
        let text = match data {
            Data::String(text) => Cow::Borrowed(text.as_str()),
            Data::Bytes(bytes) => decode(side, bytes)?,
            other => {
                return Err(PayloadTypeError::Unsupported {
                    side,
                    found: other.type_name(),
                }
                .into())
            }
        };
        let document = self.parser.parse(&text)?;
        Ok(xt_xsd::map(&document, &self.schema)?)
    }
}

/// Decodes payload bytes as UTF-8, or as UTF-16 if they start with its byte order mark.
fn decode(side: Side, bytes: &[u8]) -> Result<Cow<'_, str>, PayloadTypeError> {
    let (encoding, bom_length) = Encoding::for_bom(bytes).unwrap_or((UTF_8, 0));
    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_length..])
        .ok_or(PayloadTypeError::Malformed {
            side,
            encoding: encoding.name(),
        })
}

/// Converts the XML payload on one side of a record into a typed record.
pub struct FromXml {
    side: Side,
    resolvers: Vec<Box<dyn SchemaResolver>>,
    state: RwLock<State>,
}

impl FromXml {
    /// Converts record keys.
    pub fn key() -> Self {
        Self::new(Side::Key)
    }

    /// Converts record values.
    pub fn value() -> Self {
        Self::new(Side::Value)
    }

    pub fn new(side: Side) -> Self {
        Self::with_resolvers(side, default_resolvers())
    }

    pub fn with_resolvers(side: Side, resolvers: Vec<Box<dyn SchemaResolver>>) -> Self {
        Self {
            side,
            resolvers,
            state: RwLock::new(State::Unconfigured),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// The compiled schema, once configured and until closed.
    pub fn schema(&self) -> Option<Arc<CompiledSchema>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Configured(configured) => Some(configured.schema.clone()),
            _ => None,
        }
    }

    fn configured(&self) -> Result<Arc<Configured>, ApplyError> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Unconfigured => Err(ApplyError::NotConfigured),
            State::Configured(configured) => Ok(configured.clone()),
            State::Closed => Err(ApplyError::Closed),
        }
    }
}

impl Transformation for FromXml {
    fn configure(&mut self, settings: &HashMap<String, String>) -> Result<(), ConfigureError> {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        match state {
            State::Unconfigured => {}
            State::Configured(_) => return Err(ConfigureError::InvalidState("configured")),
            State::Closed => return Err(ConfigureError::InvalidState("closed")),
        }

        let config = FromXmlConfig::from_settings(settings)?;
        let sources = load_sources(&config.schema_urls, &self.resolvers)?;
        let schema = xt_xsd::compile(&sources, &config.compile_options())?;
        info!(
            side = %self.side,
            sources = sources.len(),
            shapes = schema.shapes().len(),
            roots = schema.roots().count(),
            "schema compiled"
        );

        let reroute = config
            .reroute_topic()
            .map(|topic| {
                debug!(topic, shape = %config.reroute_schema_name, "constructing fallback shape");
                Reroute::new(topic, &config.reroute_schema_name)
            })
            .transpose()?;

        *state = State::Configured(Arc::new(Configured {
            schema: Arc::new(schema),
            parser: XmlParser::new(config.allow_dtd),
            reroute,
        }));
        Ok(())
    }

    fn apply(&self, record: &Record) -> Result<Record, ApplyError> {
        let configured = self.configured()?;
        let data = record.data(self.side);
        if *data == Data::Null {
            trace!(topic = %record.topic, side = %self.side, "passing through null payload");
            return Ok(record.clone());
        }

        match configured.convert(self.side, data) {
            Ok(typed) => {
                let schema = Schema::Struct(typed.shape().clone());
                Ok(record.with_side(self.side, Some(schema), Data::Struct(typed)))
            }
            Err(error) => match &configured.reroute {
                Some(reroute) => {
                    debug!(
                        topic = %record.topic,
                        reroute = %reroute.topic,
                        side = %self.side,
                        %error,
                        "invalid record, rerouting"
                    );
                    reroute.wrap(record, self.side).map_err(ApplyError::Reroute)
                }
                None => Err(ApplyError::Record {
                    side: self.side,
                    source: error,
                }),
            },
        }
    }

    fn close(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let State::Configured(_) = &*state {
            debug!(side = %self.side, "closing transform");
        }
        *state = State::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{REROUTE_TOPIC_CONFIG, SCHEMA_PATH_CONFIG};
    use crate::error::ResolveError;
    use url::Url;
    use xt_xsd::{MappingError, QName, Value};

    const BOOKS_XSD: &str = include_str!("../testdata/books.xsd");
    const BOOKS_XML: &str = include_str!("../testdata/books.xml");
    const MISSING_PUBLISHED: &str = "<book><title>Dune</title></book>";

    /// Serves `mem:` URLs from memory.
    struct MemoryResolver(HashMap<String, &'static str>);

    impl SchemaResolver for MemoryResolver {
        fn supports(&self, url: &Url) -> bool {
            url.scheme() == "mem"
        }

        fn fetch(&self, url: &Url) -> Result<Vec<u8>, ResolveError> {
            self.0
                .get(url.as_str())
                .map(|content| content.as_bytes().to_vec())
                .ok_or_else(|| ResolveError::NotAFile {
                    url: url.to_string(),
                })
        }
    }

    fn transform(side: Side, settings: &[(&str, &str)]) -> FromXml {
        let resolver = MemoryResolver(HashMap::from([("mem:books.xsd".to_string(), BOOKS_XSD)]));
        let mut transform = FromXml::with_resolvers(side, vec![Box::new(resolver)]);
        let mut settings = settings
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        settings
            .entry(SCHEMA_PATH_CONFIG.to_string())
            .or_insert_with(|| "mem:books.xsd".to_string());
        transform.configure(&settings).unwrap();
        transform
    }

    #[test]
    fn converts_value_payload() {
        let transform = transform(Side::Value, &[]);
        let record = Record::new("books", "isbn-1", BOOKS_XML.as_bytes().to_vec())
            .with_partition(2)
            .with_timestamp(42);

        let out = transform.apply(&record).unwrap();
        assert_eq!(out.topic, "books");
        assert_eq!((out.partition, out.timestamp), (Some(2), Some(42)));
        assert_eq!(out.key, record.key);
        assert_eq!(out.key_schema, Some(Schema::String));

        let Data::Struct(book) = &out.value else {
            panic!("value was not converted: {:?}", out.value);
        };
        assert_eq!(book.shape().name().to_string(), "xmltransform.model.Book");
        assert_eq!(book.get("title").and_then(Value::as_str), Some("Dune"));
        assert_eq!(book.get("pages"), Some(&Value::Int64(412)));
        let names = book.iter().map(|(f, _)| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["title", "published", "pages", "author"]);
        assert!(matches!(&out.value_schema, Some(Schema::Struct(shape)) if shape == book.shape()));
    }

    #[test]
    fn converts_key_payload_and_leaves_value() {
        let transform = transform(Side::Key, &[]);
        let record = Record::new("books", BOOKS_XML, "payload");
        let out = transform.apply(&record).unwrap();
        assert!(matches!(out.key, Data::Struct(_)));
        assert_eq!(out.value, Data::from("payload"));
        assert_eq!(out.value_schema, Some(Schema::String));
    }

    #[test]
    fn reroutes_failed_record() {
        let transform = transform(Side::Value, &[(REROUTE_TOPIC_CONFIG, "dlq")]);
        let record = Record::new("books", "isbn-1", MISSING_PUBLISHED);

        let out = transform.apply(&record).unwrap();
        assert_eq!(out.topic, "dlq");
        assert_eq!(out.key, record.key);
        let Data::Struct(bad) = &out.value else {
            panic!("value was not wrapped: {:?}", out.value);
        };
        assert_eq!(bad.shape().name().to_string(), "xmltransform.dlq.schema");
        assert_eq!(bad.shape().fields().len(), 1);
        assert!(!bad.shape().fields()[0].optional);
        assert_eq!(
            bad.get(BAD_PAYLOAD_FIELD).and_then(Value::as_str),
            Some(MISSING_PUBLISHED)
        );
    }

    #[test]
    fn reroutes_malformed_xml_and_foreign_types() {
        let transform = transform(Side::Key, &[(REROUTE_TOPIC_CONFIG, "dlq")]);

        let out = transform.apply(&Record::new("books", "<book>", "v")).unwrap();
        assert_eq!(out.topic, "dlq");
        assert_eq!(out.value, Data::from("v"));

        let out = transform
            .apply(&Record::new("books", Data::Int64(7), "v"))
            .unwrap();
        let Data::Struct(bad) = &out.key else {
            panic!("key was not wrapped");
        };
        assert_eq!(bad.get(BAD_PAYLOAD_FIELD).and_then(Value::as_str), Some("7"));
    }

    #[test]
    fn fails_record_without_reroute_topic() {
        let transform = transform(Side::Value, &[]);
        let err = transform
            .apply(&Record::new("books", Data::Null, MISSING_PUBLISHED))
            .unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Record {
                side: Side::Value,
                source: RecordError::Mapping(MappingError::MissingField { .. })
            }
        ));

        let err = transform
            .apply(&Record::new("books", Data::Null, "<magazine/>"))
            .unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Record {
                source: RecordError::Mapping(MappingError::UnknownRoot(name)),
                ..
            } if name == QName::local("magazine")
        ));

        let err = transform
            .apply(&Record::new("books", Data::Null, Data::Boolean(true)))
            .unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Record {
                source: RecordError::PayloadType(PayloadTypeError::Unsupported { found: "boolean", .. }),
                ..
            }
        ));
    }

    #[test]
    fn malformed_bytes_are_a_payload_type_error() {
        let transform = transform(Side::Value, &[]);
        let err = transform
            .apply(&Record::new("books", Data::Null, vec![b'<', 0xff, b'>']))
            .unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Record {
                source: RecordError::PayloadType(PayloadTypeError::Malformed { encoding: "UTF-8", .. }),
                ..
            }
        ));
    }

    #[test]
    fn decodes_byte_order_marks() {
        let transform = transform(Side::Value, &[]);
        let mut utf8 = vec![0xef, 0xbb, 0xbf];
        utf8.extend_from_slice(BOOKS_XML.as_bytes());
        assert!(matches!(
            transform.apply(&Record::new("books", Data::Null, utf8)).unwrap().value,
            Data::Struct(_)
        ));

        let mut utf16 = vec![0xff, 0xfe];
        utf16.extend(
            "<book><published>1965-08-01T00:00:00Z</published></book>"
                .encode_utf16()
                .flat_map(u16::to_le_bytes),
        );
        assert!(matches!(
            transform.apply(&Record::new("books", Data::Null, utf16)).unwrap().value,
            Data::Struct(_)
        ));
    }

    #[test]
    fn null_payload_passes_through() {
        let transform = transform(Side::Value, &[]);
        let tombstone = Record::new("books", "isbn-1", Data::Null);
        assert_eq!(transform.apply(&tombstone).unwrap(), tombstone);
    }

    #[test]
    fn lifecycle() {
        let unconfigured = FromXml::value();
        assert!(matches!(
            unconfigured.apply(&Record::new("t", Data::Null, "<book/>")),
            Err(ApplyError::NotConfigured)
        ));

        let mut transform = transform(Side::Value, &[]);
        assert!(transform.schema().is_some());
        let settings = HashMap::from([(SCHEMA_PATH_CONFIG.to_string(), "mem:books.xsd".to_string())]);
        assert!(matches!(
            transform.configure(&settings),
            Err(ConfigureError::InvalidState("configured"))
        ));

        transform.close();
        transform.close();
        assert!(transform.schema().is_none());
        assert!(matches!(
            transform.apply(&Record::new("t", Data::Null, BOOKS_XML)),
            Err(ApplyError::Closed)
        ));
        assert!(matches!(
            transform.configure(&settings),
            Err(ConfigureError::InvalidState("closed"))
        ));
    }

    #[test]
    fn failed_configuration_leaves_transform_unconfigured() {
        let mut transform = FromXml::with_resolvers(Side::Value, vec![]);
        let settings = HashMap::from([(SCHEMA_PATH_CONFIG.to_string(), "mem:books.xsd".to_string())]);
        assert!(matches!(
            transform.configure(&settings),
            Err(ConfigureError::Resolve(ResolveError::UnsupportedScheme { .. }))
        ));
        assert!(transform.schema().is_none());

        let broken = MemoryResolver(HashMap::from([(
            "mem:broken.xsd".to_string(),
            "<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\"><xs:element name=\"a\" type=\"Missing\"/></xs:schema>",
        )]));
        let mut transform = FromXml::with_resolvers(Side::Value, vec![Box::new(broken)]);
        let settings = HashMap::from([(SCHEMA_PATH_CONFIG.to_string(), "mem:broken.xsd".to_string())]);
        assert!(matches!(
            transform.configure(&settings),
            Err(ConfigureError::Compile(SchemaCompilationError::Unresolved { .. }))
        ));
    }

    #[test]
    fn configures_from_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.xsd");
        std::fs::write(&path, BOOKS_XSD).unwrap();

        let mut transform = FromXml::value();
        let url = Url::from_file_path(&path).unwrap();
        let settings = HashMap::from([(SCHEMA_PATH_CONFIG.to_string(), url.to_string())]);
        transform.configure(&settings).unwrap();
        let schema = transform.schema().unwrap();
        assert_eq!(schema.sources(), [url.to_string()]);
        assert!(schema.root(&QName::local("book")).is_some());
    }

    #[test]
    fn applies_concurrently() {
        let transform = transform(Side::Value, &[(REROUTE_TOPIC_CONFIG, "dlq")]);
        let expected = transform
            .apply(&Record::new("books", Data::Null, BOOKS_XML))
            .unwrap();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let transform = &transform;
                let expected = &expected;
                scope.spawn(move || {
                    for _ in 0..50 {
                        if i % 2 == 0 {
                            let out = transform
                                .apply(&Record::new("books", Data::Null, BOOKS_XML))
                                .unwrap();
                            assert_eq!(&out, expected);
                        } else {
                            let out = transform
                                .apply(&Record::new("books", Data::Null, MISSING_PUBLISHED))
                                .unwrap();
                            assert_eq!(out.topic, "dlq");
                        }
                    }
                });
            }
        });
    }
}
