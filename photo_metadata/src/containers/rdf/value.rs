//! The values an RDF packet holds.

use rustc_hash::FxHashMap;

use super::NS_XML;

/// The name of a property, struct field, or qualifier.
///
/// The prefix used to write a namespace isn't part of the name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name {
    pub namespace: String,
    pub name: String,
}

impl Name {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Whether this is `name` in `namespace`.
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

impl core::fmt::Display for Name {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}]{}", self.namespace, self.name)
    }
}

/// Named values, without an order.
pub type Struct = FxHashMap<Name, Value>;

/// An unqualified value.
#[derive(Clone, Debug, PartialEq)]
pub enum Simple {
    String(String),

    /// Means the same as a string, but it's written as `rdf:resource`.
    Uri(String),

    Struct(Struct),

    /// An ordered array.
    Seq(Vec<Value>),

    /// An unordered array.
    Bag(Vec<Value>),

    /// Alternatives, with the first being the default.
    Alt(Vec<Value>),
}

/// A value, along with any qualifiers attached to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub qualifiers: Struct,
    pub value: Simple,
}

impl Value {
    /// An unqualified value.
    pub fn new(value: Simple) -> Self {
        Self {
            qualifiers: Struct::default(),
            value,
        }
    }

    /// An unqualified string.
    pub fn string(text: impl Into<String>) -> Self {
        Self::new(Simple::String(text.into()))
    }

    /// A string with an `xml:lang` qualifier, as found in language
    /// alternatives.
    pub fn with_lang(text: impl Into<String>, lang: &str) -> Self {
        let mut value = Self::string(text);
        value
            .qualifiers
            .insert(Name::new(NS_XML, "lang"), Value::string(lang));
        value
    }

    /// The text of a string or URI.
    pub fn as_str(&self) -> Option<&str> {
        match self.value {
            Simple::String(ref s) | Simple::Uri(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self.value {
            Simple::Struct(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut Struct> {
        match self.value {
            Simple::Struct(ref mut s) => Some(s),
            _ => None,
        }
    }

    /// The items of any kind of array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self.value {
            Simple::Seq(ref a) | Simple::Bag(ref a) | Simple::Alt(ref a) => Some(a),
            _ => None,
        }
    }

    /// The items of any kind of array.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self.value {
            Simple::Seq(ref mut a) | Simple::Bag(ref mut a) | Simple::Alt(ref mut a) => Some(a),
            _ => None,
        }
    }

    /// The `xml:lang` qualifier, if there is one.
    pub fn lang(&self) -> Option<&str> {
        self.qualifiers
            .get(&Name::new(NS_XML, "lang"))
            .and_then(Value::as_str)
    }

    /// A struct field, if this is a struct.
    pub fn field(&self, namespace: &str, name: &str) -> Option<&Value> {
        self.as_struct()?.get(&Name::new(namespace, name))
    }
}
