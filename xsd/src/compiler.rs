use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, info, trace};

use super::{
    complex_type_def::ComplexTypeDefinition,
    element_decl::ElementDeclaration,
    error::SchemaCompilationError,
    mapping_context::CompileContext,
    model::CompiledSchema,
    schema::{DefinitionKind, SchemaDocument},
    simple_type_def::SimpleTypeDefinition,
};

/// Package used when none is configured.
pub const DEFAULT_PACKAGE: &str = "xmltransform.model";

/// The bytes of one schema document and the URI they were loaded from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaSource {
    pub uri: String,
    pub content: Vec<u8>,
}

impl SchemaSource {
    pub fn new(uri: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            uri: uri.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Namespace all shape names are qualified with
    pub target_package: String,
    /// Reject constructs without a record representation instead of coercing them to `string`
    pub strict_check: bool,
    /// Suffix colliding shape and field names instead of failing
    pub resolve_name_conflicts: bool,
    pub allow_dtd: bool,
    /// Log every compiled shape at info level
    pub verbose: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target_package: DEFAULT_PACKAGE.to_string(),
            strict_check: false,
            resolve_name_conflicts: false,
            allow_dtd: false,
            verbose: false,
        }
    }
}

/// Compiles `sources` together into record shapes.
///
/// The sources share one set of symbol spaces, so `include` and `import` directives need no
/// resolution of their own: every referenced schema has to be among `sources`. Every top-level
/// complex type yields a shape, and every global element with complex content registers its
/// shape as the one for documents rooted at that element.
pub fn compile(
    sources: &[SchemaSource],
    options: &CompileOptions,
) -> Result<CompiledSchema, SchemaCompilationError> {
    if sources.is_empty() {
        return Err(SchemaCompilationError::NoSources);
    }

    let texts = sources
        .iter()
        .map(|source| Encoding::decode(UTF_8, &source.content).0)
        .collect::<Vec<_>>();
    let mut xml = Vec::with_capacity(sources.len());
    for (source, text) in sources.iter().zip(&texts) {
        let parsing = roxmltree::ParsingOptions {
            allow_dtd: options.allow_dtd,
            ..roxmltree::ParsingOptions::default()
        };
        let document = roxmltree::Document::parse_with_options(text, parsing).map_err(|e| {
            SchemaCompilationError::Xml {
                uri: source.uri.clone(),
                source: e,
            }
        })?;
        xml.push(document);
    }

    let documents = sources
        .iter()
        .zip(&xml)
        .map(|(source, document)| SchemaDocument::map_from_xml(&source.uri, document.root_element()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut context = CompileContext::new(options, documents)?;
    for source in 0..context.documents().len() {
        debug!(uri = context.document(source).uri, "compiling schema source");
        let top_level = context.document(source).top_level().collect::<Vec<_>>();

        for &(kind, node) in &top_level {
            match (kind, node.tag_name().name()) {
                (DefinitionKind::Type, ComplexTypeDefinition::TAG_NAME) => {
                    ComplexTypeDefinition::compile_named(&mut context, source, node)?;
                }
                (DefinitionKind::Type, _) => {
                    SimpleTypeDefinition::kind(&mut context, source, node)?;
                }
                _ => {}
            }
        }
        for &(kind, node) in &top_level {
            if kind != DefinitionKind::Element {
                continue;
            }
            if let Some((name, shape)) = ElementDeclaration::root_shape(&mut context, source, node)? {
                context.register_root(name, shape, source)?;
            }
        }
    }

    let schema = context.finish();
    for shape in schema.shapes() {
        if options.verbose {
            info!("compiled {shape}");
        } else {
            trace!("compiled {shape}");
        }
    }
    for (element, shape) in schema.roots() {
        debug!(%element, shape = %shape.name(), "root element");
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogicalKind, NodeKind};
    use crate::xstypes::QName;

    const BOOKS: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Published">
    <xs:restriction base="xs:dateTime"/>
  </xs:simpleType>
  <xs:complexType name="Book">
    <xs:annotation><xs:documentation>A published book.</xs:documentation></xs:annotation>
    <xs:sequence>
      <xs:element name="title" type="xs:string"/>
      <xs:element name="published" type="Published" minOccurs="1"/>
      <xs:element name="pages" type="xs:positiveInteger" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
  <xs:element name="book" type="Book"/>
</xs:schema>"#;

    fn compile_one(xsd: &str, options: &CompileOptions) -> Result<CompiledSchema, SchemaCompilationError> {
        compile(&[SchemaSource::new("mem:test.xsd", xsd)], options)
    }

    fn schema(body: &str) -> String {
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:test"
                 xmlns="urn:test" elementFormDefault="qualified">{body}</xs:schema>"#
        )
    }

    #[test]
    fn compiles_book_schema() {
        let compiled = compile_one(BOOKS, &CompileOptions::default()).unwrap();
        let book = compiled.root(&QName::local("book")).unwrap();
        assert_eq!(book.name().to_string(), "xmltransform.model.Book");
        assert_eq!(book.doc(), Some("A published book."));

        let fields = book.fields();
        assert_eq!(fields.len(), 3);
        assert_eq!((fields[0].name.as_str(), &fields[0].kind), ("title", &LogicalKind::String));
        assert!(fields[0].optional);
        assert_eq!(fields[1].kind, LogicalKind::Timestamp);
        assert!(!fields[1].optional);
        assert_eq!(fields[2].kind, LogicalKind::Int64);
        assert!(fields[2].optional);
        assert_eq!(book.required_fields().count(), 1);
    }

    #[test]
    fn nested_types_become_structs() {
        let xsd = schema(
            r#"<xs:complexType name="Address">
                 <xs:sequence><xs:element name="city" type="xs:string" minOccurs="1"/></xs:sequence>
               </xs:complexType>
               <xs:element name="person">
                 <xs:complexType>
                   <xs:sequence>
                     <xs:element name="home" type="Address"/>
                     <xs:element name="born">
                       <xs:complexType>
                         <xs:sequence><xs:element name="on" type="xs:date"/></xs:sequence>
                       </xs:complexType>
                     </xs:element>
                     <xs:element name="nickname" type="xs:string" maxOccurs="unbounded"/>
                   </xs:sequence>
                   <xs:attribute name="id" type="xs:positiveInteger" use="required"/>
                 </xs:complexType>
               </xs:element>"#,
        );
        let compiled = compile_one(&xsd, &CompileOptions::default()).unwrap();
        let person = compiled
            .root(&QName::with_namespace("urn:test", "person"))
            .unwrap();
        assert_eq!(person.name().local, "Person");

        let home = person.field("home").unwrap();
        assert_eq!(home.node_name, QName::with_namespace("urn:test", "home"));
        assert_eq!(home.kind.shape().unwrap().name().local, "Address");

        let born = person.field("born").unwrap();
        assert_eq!(born.kind.shape().unwrap().name().local, "PersonBorn");

        assert!(person.field("nickname").unwrap().repeated);

        let id = person.field("id").unwrap();
        assert_eq!(id.node_kind, NodeKind::Attribute);
        assert_eq!(id.node_name, QName::local("id"));
        assert!(!id.optional);

        // Nested shapes are compiled before the shapes that use them.
        let order = compiled
            .shapes()
            .iter()
            .map(|s| s.name().local.clone())
            .collect::<Vec<_>>();
        assert_eq!(order, ["Address", "PersonBorn", "Person"]);
    }

    #[test]
    fn named_simple_types_follow_restriction_chain() {
        let xsd = schema(
            r#"<xs:simpleType name="Day"><xs:restriction base="xs:date"/></xs:simpleType>
               <xs:simpleType name="Holiday"><xs:restriction base="Day"/></xs:simpleType>
               <xs:simpleType name="Codes"><xs:list itemType="xs:positiveInteger"/></xs:simpleType>
               <xs:complexType name="Event">
                 <xs:sequence>
                   <xs:element name="day" type="Holiday"/>
                   <xs:element name="at" type="xs:time"/>
                   <xs:element name="codes" type="Codes"/>
                   <xs:element name="count" type="xs:int"/>
                 </xs:sequence>
               </xs:complexType>"#,
        );
        let compiled = compile_one(&xsd, &CompileOptions::default()).unwrap();
        let event = compiled.shape("xmltransform.model.Event").unwrap();
        let kinds = event.fields().iter().map(|f| f.kind.name()).collect::<Vec<_>>();
        assert_eq!(kinds, ["date", "time", "string", "string"]);
    }

    #[test]
    fn colliding_types_across_sources() {
        let address = schema(
            r#"<xs:complexType name="Address">
                 <xs:sequence><xs:element name="street" type="xs:string"/></xs:sequence>
               </xs:complexType>"#,
        );
        let sources = [
            SchemaSource::new("mem:a.xsd", address.as_str()),
            SchemaSource::new("mem:b.xsd", address.as_str()),
        ];

        let err = compile(&sources, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, SchemaCompilationError::NameCollision { .. }));

        let options = CompileOptions {
            resolve_name_conflicts: true,
            ..CompileOptions::default()
        };
        let compiled = compile(&sources, &options).unwrap();
        let names = compiled
            .shapes()
            .iter()
            .map(|s| s.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            ["xmltransform.model.Address", "xmltransform.model.Address2"]
        );
    }

    #[test]
    fn anonymous_type_names_step_aside_for_named_types() {
        let born = |field: &str| {
            format!(
                r#"<xs:element name="born">
                     <xs:complexType>
                       <xs:sequence><xs:element name="{field}" type="xs:string"/></xs:sequence>
                     </xs:complexType>
                   </xs:element>"#
            )
        };
        let person_born = r#"<xs:complexType name="PersonBorn">
                 <xs:sequence><xs:element name="year" type="xs:string"/></xs:sequence>
               </xs:complexType>"#;

        // Named type first, then a root element whose nested anonymous type wants its name.
        let xsd = schema(&format!(
            r#"{person_born}
               <xs:element name="person">
                 <xs:complexType><xs:sequence>{}</xs:sequence></xs:complexType>
               </xs:element>"#,
            born("day")
        ));
        let compiled = compile_one(&xsd, &CompileOptions::default()).unwrap();
        let named = compiled.shape("xmltransform.model.PersonBorn").unwrap();
        assert_eq!(named.fields()[0].name, "year");
        let anonymous = compiled.shape("xmltransform.model.PersonBorn2").unwrap();
        assert_eq!(anonymous.fields()[0].name, "day");

        // The anonymous type is compiled before the named type it would shadow.
        let xsd = schema(&format!(
            r#"<xs:complexType name="Person"><xs:sequence>{}</xs:sequence></xs:complexType>
               {person_born}"#,
            born("place")
        ));
        let compiled = compile_one(&xsd, &CompileOptions::default()).unwrap();
        let named = compiled.shape("xmltransform.model.PersonBorn").unwrap();
        assert_eq!(named.fields()[0].name, "year");
        let anonymous = compiled.shape("xmltransform.model.PersonBorn2").unwrap();
        assert_eq!(anonymous.fields()[0].name, "place");
    }

    #[test]
    fn colliding_types_in_one_source() {
        let xsd = schema(
            r#"<xs:complexType name="address">
                 <xs:sequence><xs:element name="street" type="xs:string"/></xs:sequence>
               </xs:complexType>
               <xs:complexType name="Address">
                 <xs:sequence><xs:element name="city" type="xs:string"/></xs:sequence>
               </xs:complexType>"#,
        );
        let err = compile_one(&xsd, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, SchemaCompilationError::NameCollision { .. }));
        assert_eq!(
            err.to_string(),
            "shape name xmltransform.model.Address is produced twice by mem:test.xsd"
        );
    }

    #[test]
    fn cycles_fail_compilation() {
        let xsd = schema(
            r#"<xs:complexType name="Node">
                 <xs:sequence><xs:element name="next" type="Node" minOccurs="0"/></xs:sequence>
               </xs:complexType>"#,
        );
        let err = compile_one(&xsd, &CompileOptions::default()).unwrap_err();
        match err {
            SchemaCompilationError::Circular { path } => {
                assert_eq!(path, ["complexType Node", "complexType Node"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn unresolved_type_fails_compilation() {
        let xsd = schema(
            r#"<xs:complexType name="Book">
                 <xs:sequence><xs:element name="isbn" type="Isbn"/></xs:sequence>
               </xs:complexType>"#,
        );
        let err = compile_one(&xsd, &CompileOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SchemaCompilationError::Unresolved { kind: "type", name, .. }
                if name == QName::with_namespace("urn:test", "Isbn")
        ));
    }

    #[test]
    fn strict_checking_rejects_wildcards() {
        let xsd = schema(
            r#"<xs:complexType name="Open">
                 <xs:sequence>
                   <xs:element name="id" type="xs:string"/>
                   <xs:any processContents="lax"/>
                 </xs:sequence>
               </xs:complexType>"#,
        );
        let lenient = compile_one(&xsd, &CompileOptions::default()).unwrap();
        assert_eq!(lenient.shapes()[0].fields().len(), 1);

        let strict = CompileOptions {
            strict_check: true,
            ..CompileOptions::default()
        };
        assert!(matches!(
            compile_one(&xsd, &strict),
            Err(SchemaCompilationError::Unrepresentable { construct: "xs:any wildcard", .. })
        ));
    }

    #[test]
    fn untyped_elements_default_to_string() {
        let xsd = schema(r#"<xs:complexType name="Note"><xs:sequence><xs:element name="body"/></xs:sequence></xs:complexType>"#);
        let compiled = compile_one(&xsd, &CompileOptions::default()).unwrap();
        assert_eq!(compiled.shapes()[0].fields()[0].kind, LogicalKind::String);

        let strict = CompileOptions {
            strict_check: true,
            ..CompileOptions::default()
        };
        assert!(compile_one(&xsd, &strict).is_err());
    }

    #[test]
    fn extension_and_simple_content() {
        let xsd = schema(
            r#"<xs:complexType name="Price">
                 <xs:simpleContent>
                   <xs:extension base="xs:positiveInteger">
                     <xs:attribute name="currency" type="xs:string"/>
                   </xs:extension>
                 </xs:simpleContent>
               </xs:complexType>
               <xs:complexType name="Item">
                 <xs:sequence><xs:element name="name" type="xs:string"/></xs:sequence>
               </xs:complexType>
               <xs:complexType name="PricedItem">
                 <xs:complexContent>
                   <xs:extension base="Item">
                     <xs:sequence><xs:element name="price" type="Price"/></xs:sequence>
                   </xs:extension>
                 </xs:complexContent>
               </xs:complexType>"#,
        );
        let compiled = compile_one(&xsd, &CompileOptions::default()).unwrap();

        let price = compiled.shape("xmltransform.model.Price").unwrap();
        let value = price.field("value").unwrap();
        assert_eq!(value.node_kind, NodeKind::Text);
        assert_eq!(value.kind, LogicalKind::Int64);
        assert!(!value.optional);
        assert_eq!(price.field("currency").unwrap().node_kind, NodeKind::Attribute);

        let priced = compiled.shape("xmltransform.model.PricedItem").unwrap();
        let names = priced.fields().iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["name", "price"]);
    }

    #[test]
    fn groups_and_choices() {
        let xsd = schema(
            r#"<xs:group name="Contact">
                 <xs:choice>
                   <xs:element name="email" type="xs:string" minOccurs="1"/>
                   <xs:element name="phone" type="xs:string" minOccurs="1"/>
                 </xs:choice>
               </xs:group>
               <xs:attributeGroup name="Audit">
                 <xs:attribute name="created" type="xs:dateTime"/>
                 <xs:attribute name="legacy" use="prohibited"/>
               </xs:attributeGroup>
               <xs:complexType name="Customer">
                 <xs:sequence>
                   <xs:element name="name" type="xs:string" minOccurs="1"/>
                   <xs:group ref="Contact"/>
                 </xs:sequence>
                 <xs:attributeGroup ref="Audit"/>
               </xs:complexType>"#,
        );
        let compiled = compile_one(&xsd, &CompileOptions::default()).unwrap();
        let customer = compiled.shape("xmltransform.model.Customer").unwrap();
        let summary = customer
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.optional))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            [("name", false), ("email", true), ("phone", true), ("created", true)]
        );
    }

    #[test]
    fn malformed_source_is_reported_with_its_uri() {
        let err = compile(
            &[SchemaSource::new("mem:broken.xsd", "<xs:schema")],
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaCompilationError::Xml { uri, .. } if uri == "mem:broken.xsd"));
        assert!(matches!(
            compile(&[], &CompileOptions::default()),
            Err(SchemaCompilationError::NoSources)
        ));
    }

    #[test]
    fn duplicate_root_elements() {
        let book = schema(
            r#"<xs:element name="note"><xs:complexType><xs:sequence>
                 <xs:element name="text" type="xs:string"/>
               </xs:sequence></xs:complexType></xs:element>"#,
        );
        let sources = [
            SchemaSource::new("mem:a.xsd", book.as_str()),
            SchemaSource::new("mem:b.xsd", book.as_str()),
        ];
        // The anonymous types collide first.
        assert!(compile(&sources, &CompileOptions::default()).is_err());

        let options = CompileOptions {
            resolve_name_conflicts: true,
            ..CompileOptions::default()
        };
        let compiled = compile(&sources, &options).unwrap();
        let root = compiled
            .root(&QName::with_namespace("urn:test", "note"))
            .unwrap();
        assert_eq!(root.name().local, "Note");
        assert_eq!(compiled.roots().count(), 1);
    }
}
