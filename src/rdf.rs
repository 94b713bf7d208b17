use crate::error::Error;

// https://json-ld.github.io/normalization/spec/
// https://www.w3.org/TR/n-quads/#terminals

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub subject: Subject,
    pub predicate: Predicate,
    pub object: Object,
    pub graph_label: Option<GraphLabel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    IRIRef(IRIRef),
    BlankNodeLabel(BlankNodeLabel),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    IRIRef(IRIRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    IRIRef(IRIRef),
    BlankNodeLabel(BlankNodeLabel),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphLabel {
    IRIRef(IRIRef),
    BlankNodeLabel(BlankNodeLabel),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IRIRef(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct BlankNodeLabel(pub String);

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String { string: StringLiteral },
    Typed { string: StringLiteral, type_: IRIRef },
    LangTagged { string: StringLiteral, lang: Lang },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct Lang(pub String);

impl From<Subject> for Object {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::IRIRef(iri) => Object::IRIRef(iri),
            Subject::BlankNodeLabel(label) => Object::BlankNodeLabel(label),
        }
    }
}

impl Predicate {
    pub fn iri(iri: &str) -> Self {
        Predicate::IRIRef(IRIRef(iri.to_string()))
    }
}

impl From<&Statement> for String {
    fn from(statement: &Statement) -> String {
        String::from(&statement.subject)
            + " "
            + &String::from(&statement.predicate)
            + " "
            + &String::from(&statement.object)
            + &match &statement.graph_label {
                Some(graph_label) => " ".to_string() + &String::from(graph_label),
                None => "".to_string(),
            }
            + " .\n"
    }
}

impl From<&Subject> for String {
    fn from(subject: &Subject) -> String {
        match subject {
            Subject::IRIRef(iri_ref) => String::from(iri_ref),
            Subject::BlankNodeLabel(blank_node_label) => String::from(blank_node_label),
        }
    }
}

impl From<&Predicate> for String {
    fn from(predicate: &Predicate) -> String {
        match predicate {
            Predicate::IRIRef(iri_ref) => String::from(iri_ref),
        }
    }
}

impl From<&Object> for String {
    fn from(object: &Object) -> String {
        match object {
            Object::IRIRef(iri_ref) => String::from(iri_ref),
            Object::BlankNodeLabel(blank_node_label) => String::from(blank_node_label),
            Object::Literal(literal) => String::from(literal),
        }
    }
}

impl From<&GraphLabel> for String {
    fn from(graph_label: &GraphLabel) -> String {
        match graph_label {
            GraphLabel::IRIRef(iri_ref) => String::from(iri_ref),
            GraphLabel::BlankNodeLabel(blank_node_label) => String::from(blank_node_label),
        }
    }
}

impl From<&IRIRef> for String {
    fn from(iri_ref: &IRIRef) -> String {
        // Only well-formed IRIs are constructed, so no escaping is needed.
        format!("<{}>", iri_ref.0)
    }
}

impl From<&StringLiteral> for String {
    fn from(string_literal: &StringLiteral) -> String {
        let string = &string_literal.0;
        // estimate size of escaped string
        let mut out = String::with_capacity(string.len() + 6);
        out.push('"');
        for c in string.chars() {
            match c {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out.push('"');
        out
    }
}

impl From<&BlankNodeLabel> for String {
    fn from(blank_node_label: &BlankNodeLabel) -> String {
        blank_node_label.0.clone()
    }
}

impl From<&Lang> for String {
    fn from(lang: &Lang) -> String {
        lang.0.clone()
    }
}

impl From<&Literal> for String {
    fn from(literal: &Literal) -> String {
        match literal {
            Literal::String { string } => String::from(string),
            Literal::Typed { string, type_ } => String::from(string) + "^^" + &String::from(type_),
            Literal::LangTagged { string, lang } => {
                String::from(string) + "@" + &String::from(lang)
            }
        }
    }
}

impl Statement {
    /// Blank node labels in subject, object and graph position.
    pub fn blank_node_components(&self) -> Vec<&BlankNodeLabel> {
        self.blank_node_components_with_position()
            .into_iter()
            .map(|(label, _)| label)
            .collect()
    }

    /// Blank node labels paired with their position: `s`, `o` or `g`.
    pub fn blank_node_components_with_position(&self) -> Vec<(&BlankNodeLabel, char)> {
        let mut components = Vec::new();
        if let Subject::BlankNodeLabel(ref label) = self.subject {
            components.push((label, 's'));
        }
        if let Object::BlankNodeLabel(ref label) = self.object {
            components.push((label, 'o'));
        }
        if let Some(GraphLabel::BlankNodeLabel(ref label)) = self.graph_label {
            components.push((label, 'g'));
        }
        components
    }

    pub fn blank_node_components_mut(&mut self) -> Vec<&mut BlankNodeLabel> {
        let mut components = Vec::new();
        if let Subject::BlankNodeLabel(ref mut label) = self.subject {
            components.push(label);
        }
        if let Object::BlankNodeLabel(ref mut label) = self.object {
            components.push(label);
        }
        if let Some(GraphLabel::BlankNodeLabel(ref mut label)) = self.graph_label {
            components.push(label);
        }
        components
    }
}

impl DataSet {
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Add a statement, ignoring duplicates.
    pub fn add_statement(&mut self, statement: Statement) {
        if !self.statements.contains(&statement) {
            self.statements.push(statement);
        }
    }

    pub fn to_nquads(&self) -> Result<String, Error> {
        let mut lines = self
            .statements
            .iter()
            .map(|statement| statement.into())
            .collect::<Vec<String>>();
        lines.sort();
        lines.dedup();
        Ok(lines.join(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape() {
        let string_literal = StringLiteral("\t\x08\n\r\x0c\"\'\\\u{221e}".to_string());
        assert_eq!(
            String::from(&string_literal),
            "\"\t\x08\\n\\r\x0c\\\"'\\\\\u{221e}\""
        );
        let iri_ref = IRIRef("urn:ex:s".to_string());
        assert_eq!(String::from(&iri_ref), "<urn:ex:s>");
    }

    #[test]
    fn line() {
        let statement = Statement {
            subject: Subject::BlankNodeLabel(BlankNodeLabel("_:c14n0".to_string())),
            predicate: Predicate::iri(RDF_TYPE),
            object: Object::IRIRef(IRIRef("http://example.org/vocab#Foo".to_string())),
            graph_label: Some(GraphLabel::BlankNodeLabel(BlankNodeLabel("_:c14n1".to_string()))),
        };
        assert_eq!(String::from(&statement), "_:c14n0 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/vocab#Foo> _:c14n1 .\n");
        let positions: Vec<char> = statement
            .blank_node_components_with_position()
            .into_iter()
            .map(|(_, position)| position)
            .collect();
        assert_eq!(positions, ['s', 'g']);
    }

    #[test]
    fn typed_and_tagged_literals() {
        let typed = Literal::Typed {
            string: StringLiteral("1".to_string()),
            type_: IRIRef(XSD_INTEGER.to_string()),
        };
        assert_eq!(
            String::from(&typed),
            "\"1\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        let tagged = Literal::LangTagged {
            string: StringLiteral("chat".to_string()),
            lang: Lang("fr".to_string()),
        };
        assert_eq!(String::from(&tagged), "\"chat\"@fr");
    }
}
