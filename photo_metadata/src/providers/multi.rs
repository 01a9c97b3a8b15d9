//! Merges the providers of one file into a single view.
//!
//! Reads take the first provider with a value, in the order the providers
//! were added. That order is the precedence: the file handlers put the
//! providers they trust most first. Writes go to every provider.

use crate::{
    error::MetadataError,
    types::{DateTime, GpsCoords, HierValue, Location, Orientation},
};

use super::{Provider, Tags};

/// Values that can be "unset", for picking the first provider that has one.
trait Blank: Default {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for DateTime {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for GpsCoords {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for Location {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for Option<Orientation> {
    fn is_blank(&self) -> bool {
        self.is_none()
    }
}

/// The providers of one file, in precedence order.
#[derive(Debug, Default)]
pub struct MultiProvider {
    providers: Vec<Box<dyn Provider>>,
}

impl MultiProvider {
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Adds a provider after the others, so it has the lowest precedence.
    pub fn push(&mut self, provider: impl Provider + 'static) {
        log::trace!("Adding the `{}` provider.", provider.name());
        self.providers.push(Box::new(provider));
    }

    /// The names of the providers, in precedence order.
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    fn first<T: Blank>(&self, get: impl Fn(&dyn Provider) -> T) -> T {
        self.providers
            .iter()
            .map(|p| get(&**p))
            .find(|v| !v.is_blank())
            .unwrap_or_default()
    }

    fn concat<T>(&self, get: impl Fn(&dyn Provider) -> Tags<T>) -> Tags<T> {
        self.providers.iter().flat_map(|p| get(&**p)).collect()
    }

    /// Runs a setter on every provider.
    ///
    /// The first real error stops the run. Otherwise the result is
    /// [`MetadataError::NotSupported`] only when no provider took the value.
    fn fan_out(
        &mut self,
        field: &str,
        mut set: impl FnMut(&mut dyn Provider) -> Result<(), MetadataError>,
    ) -> Result<(), MetadataError> {
        let mut supported = false;
        for p in &mut self.providers {
            match set(&mut **p) {
                Ok(()) => supported = true,
                Err(e) if e.is_not_supported() => (),
                Err(e) => {
                    log::error!("Setting `{field}` failed in the `{}` provider! err: {e}", p.name());
                    return Err(e);
                }
            }
        }

        if !supported {
            log::debug!("No provider here can hold `{field}`.");
            return Err(MetadataError::NotSupported);
        }
        Ok(())
    }
}

/// Forwards each field's getter, tag lister, and setter.
macro_rules! forward {
    ( $(
        // getter, tag lister, setter
        $get:ident, $tags:ident, $set:ident:
        // what the getter returns, and what the setter takes
        $out:ty, $arg:ty;
    )+ ) => {
        $(
            fn $get(&self) -> $out {
                self.first(|p| p.$get())
            }

            fn $tags(&self) -> Tags<$out> {
                self.concat(|p| p.$tags())
            }

            fn $set(&mut self, value: $arg) -> Result<(), MetadataError> {
                self.fan_out(stringify!($get), |p| p.$set(value))
            }
        )+
    };
}

impl Provider for MultiProvider {
    fn name(&self) -> &'static str {
        "Multi"
    }

    forward! {
        caption, caption_tags, set_caption: String, &str;
        creator, creator_tags, set_creator: String, &str;
        date_time, date_time_tags, set_date_time: DateTime, &DateTime;
        faces, faces_tags, set_faces: Vec<String>, &[String];
        gps, gps_tags, set_gps: GpsCoords, &GpsCoords;
        groups, groups_tags, set_groups: Vec<HierValue>, &[HierValue];
        keywords, keywords_tags, set_keywords: Vec<HierValue>, &[HierValue];
        location, location_tags, set_location: Location, &Location;
        orientation, orientation_tags, set_orientation: Option<Orientation>, Option<Orientation>;
        people, people_tags, set_people: Vec<String>, &[String];
        places, places_tags, set_places: Vec<HierValue>, &[HierValue];
        title, title_tags, set_title: String, &str;
        topics, topics_tags, set_topics: Vec<HierValue>, &[HierValue];
    }
}

#[cfg(test)]
mod tests {
    use super::MultiProvider;
    use crate::{
        error::MetadataError,
        providers::{Provider, Tags, tag},
        util::logger,
    };

    /// Holds a caption, or refuses to, or fails.
    #[derive(Debug)]
    struct Fake {
        name: &'static str,
        caption: Option<String>,
        broken: bool,
    }

    impl Fake {
        fn holding(name: &'static str, caption: &str) -> Self {
            Self {
                name,
                caption: Some(caption.into()),
                broken: false,
            }
        }

        fn refusing(name: &'static str) -> Self {
            Self {
                name,
                caption: None,
                broken: false,
            }
        }
    }

    impl Provider for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn caption(&self) -> String {
            self.caption.clone().unwrap_or_default()
        }

        fn caption_tags(&self) -> Tags<String> {
            self.caption.iter().map(|c| tag(self.name, c.clone())).collect()
        }

        fn set_caption(&mut self, value: &str) -> Result<(), MetadataError> {
            if self.broken {
                return Err(MetadataError::Encoding("broken".into()));
            }
            match self.caption {
                Some(ref mut caption) => {
                    *caption = value.into();
                    Ok(())
                }
                None => Err(MetadataError::NotSupported),
            }
        }
    }

    #[test]
    fn reads_take_the_first_value() {
        logger();

        let providers: Vec<Box<dyn Provider>> = vec![
            Box::new(Fake::holding("a", "")),
            Box::new(Fake::refusing("b")),
            Box::new(Fake::holding("c", "from c")),
            Box::new(Fake::holding("d", "from d")),
        ];
        let multi = MultiProvider::new(providers);
        assert_eq!(multi.caption(), "from c");
        assert_eq!(
            multi.caption_tags(),
            [
                ("a".to_string(), String::new()),
                ("c".to_string(), "from c".to_string()),
                ("d".to_string(), "from d".to_string()),
            ]
        );
        assert_eq!(multi.title(), "");
        assert_eq!(multi.orientation(), None);
    }

    #[test]
    fn writes_reach_every_provider() {
        logger();

        let mut multi = MultiProvider::default();
        multi.push(Fake::holding("a", "old"));
        multi.push(Fake::refusing("b"));
        multi.push(Fake::holding("c", "old"));
        assert_eq!(multi.names(), ["a", "b", "c"]);

        multi.set_caption("new").unwrap();
        let tags = multi.caption_tags();
        assert!(tags.iter().all(|(_, c)| c == "new"));
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn not_supported_only_when_nobody_takes_it() {
        logger();

        let mut multi = MultiProvider::default();
        multi.push(Fake::refusing("a"));
        multi.push(Fake::refusing("b"));
        assert_eq!(multi.set_caption("x"), Err(MetadataError::NotSupported));
        assert_eq!(multi.set_title("x"), Err(MetadataError::NotSupported));

        let empty = &mut MultiProvider::default();
        assert_eq!(empty.set_caption("x"), Err(MetadataError::NotSupported));
    }

    #[test]
    fn real_errors_stop_the_run() {
        logger();

        let mut multi = MultiProvider::default();
        multi.push(Fake::holding("a", "old"));
        multi.push(Fake {
            broken: true,
            ..Fake::holding("b", "old")
        });
        multi.push(Fake::holding("c", "old"));

        assert_eq!(
            multi.set_caption("new"),
            Err(MetadataError::Encoding("broken".into()))
        );
        let captions: Vec<String> = multi.caption_tags().into_iter().map(|(_, c)| c).collect();
        assert_eq!(captions, ["new", "old", "old"]);
    }
}
