//! Word lists used to read product attributes out of a transcription.
//!
//! Entries map a spoken form (English, romanized Hindi or Devanagari) to a
//! canonical lowercase English term.

pub struct StyleEntry {
    pub term: &'static str,
    pub canonical: &'static str,
    pub region: &'static str,
}

pub const COLORS: &[(&str, &str)] = &[
    ("red", "red"),
    ("maroon", "maroon"),
    ("blue", "blue"),
    ("navy", "navy"),
    ("green", "green"),
    ("yellow", "yellow"),
    ("white", "white"),
    ("black", "black"),
    ("pink", "pink"),
    ("gold", "gold"),
    ("golden", "gold"),
    ("silver", "silver"),
    ("orange", "orange"),
    ("purple", "purple"),
    ("brown", "brown"),
    ("beige", "beige"),
    ("cream", "cream"),
    ("grey", "grey"),
    ("gray", "grey"),
    ("lal", "red"),
    ("laal", "red"),
    ("neela", "blue"),
    ("neeli", "blue"),
    ("hara", "green"),
    ("hari", "green"),
    ("peela", "yellow"),
    ("peeli", "yellow"),
    ("safed", "white"),
    ("kala", "black"),
    ("kaala", "black"),
    ("gulabi", "pink"),
    ("sunehra", "gold"),
    ("sunehri", "gold"),
    ("narangi", "orange"),
    ("baingani", "purple"),
    ("bhura", "brown"),
    ("लाल", "red"),
    ("नीला", "blue"),
    ("नीली", "blue"),
    ("हरा", "green"),
    ("हरी", "green"),
    ("पीला", "yellow"),
    ("पीली", "yellow"),
    ("सफेद", "white"),
    ("सफ़ेद", "white"),
    ("काला", "black"),
    ("काली", "black"),
    ("गुलाबी", "pink"),
    ("सुनहरा", "gold"),
    ("सुनहरी", "gold"),
];

pub const MATERIALS: &[(&str, &str)] = &[
    ("silk", "silk"),
    ("cotton", "cotton"),
    ("zari", "zari"),
    ("wool", "wool"),
    ("woollen", "wool"),
    ("pashmina", "pashmina"),
    ("linen", "linen"),
    ("khadi", "khadi"),
    ("jute", "jute"),
    ("brass", "brass"),
    ("copper", "copper"),
    ("bronze", "bronze"),
    ("terracotta", "terracotta"),
    ("clay", "clay"),
    ("wood", "wood"),
    ("wooden", "wood"),
    ("bamboo", "bamboo"),
    ("cane", "cane"),
    ("leather", "leather"),
    ("resham", "silk"),
    ("reshmi", "silk"),
    ("sooti", "cotton"),
    ("mitti", "clay"),
    ("lakdi", "wood"),
    ("peetal", "brass"),
    ("रेशम", "silk"),
    ("रेशमी", "silk"),
    ("सूती", "cotton"),
    ("ज़री", "zari"),
    ("जरी", "zari"),
    ("मिट्टी", "clay"),
    ("लकड़ी", "wood"),
    ("पीतल", "brass"),
];

/// Product nouns. The first one mentioned names the product.
pub const PRODUCTS: &[(&str, &str)] = &[
    ("saree", "saree"),
    ("sari", "saree"),
    ("sarees", "saree"),
    ("dupatta", "dupatta"),
    ("shawl", "shawl"),
    ("stole", "stole"),
    ("kurta", "kurta"),
    ("lehenga", "lehenga"),
    ("pot", "pot"),
    ("vase", "vase"),
    ("bowl", "bowl"),
    ("basket", "basket"),
    ("bangle", "bangle"),
    ("bangles", "bangle"),
    ("necklace", "necklace"),
    ("earrings", "earrings"),
    ("rug", "rug"),
    ("carpet", "carpet"),
    ("dari", "durrie"),
    ("durrie", "durrie"),
    ("bedsheet", "bedsheet"),
    ("painting", "painting"),
    ("lamp", "lamp"),
    ("diya", "lamp"),
    ("idol", "idol"),
    ("murti", "idol"),
    ("toy", "toy"),
    ("bag", "bag"),
    ("jhola", "bag"),
    ("साड़ी", "saree"),
    ("साडी", "saree"),
    ("दुपट्टा", "dupatta"),
    ("शॉल", "shawl"),
    ("कुर्ता", "kurta"),
    ("मटका", "pot"),
    ("टोकरी", "basket"),
    ("चूड़ी", "bangle"),
    ("चूड़ियाँ", "bangle"),
    ("दीया", "lamp"),
    ("मूर्ति", "idol"),
];

/// Regional styles that qualify a product noun and imply its origin.
pub const STYLES: &[StyleEntry] = &[
    StyleEntry { term: "banarasi", canonical: "banarasi", region: "Varanasi, Uttar Pradesh" },
    StyleEntry { term: "benarasi", canonical: "banarasi", region: "Varanasi, Uttar Pradesh" },
    StyleEntry { term: "बनारसी", canonical: "banarasi", region: "Varanasi, Uttar Pradesh" },
    StyleEntry { term: "kanjeevaram", canonical: "kanjeevaram", region: "Kanchipuram, Tamil Nadu" },
    StyleEntry { term: "kanchipuram", canonical: "kanjeevaram", region: "Kanchipuram, Tamil Nadu" },
    StyleEntry { term: "chanderi", canonical: "chanderi", region: "Chanderi, Madhya Pradesh" },
    StyleEntry { term: "paithani", canonical: "paithani", region: "Paithan, Maharashtra" },
    StyleEntry { term: "pochampally", canonical: "pochampally", region: "Pochampally, Telangana" },
    StyleEntry { term: "sambalpuri", canonical: "sambalpuri", region: "Sambalpur, Odisha" },
    StyleEntry { term: "bandhani", canonical: "bandhani", region: "Kutch, Gujarat" },
    StyleEntry { term: "madhubani", canonical: "madhubani", region: "Mithila, Bihar" },
    StyleEntry { term: "phulkari", canonical: "phulkari", region: "Punjab" },
    StyleEntry { term: "kalamkari", canonical: "kalamkari", region: "Srikalahasti, Andhra Pradesh" },
    StyleEntry { term: "dhokra", canonical: "dhokra", region: "Bastar, Chhattisgarh" },
    StyleEntry { term: "kantha", canonical: "kantha", region: "West Bengal" },
    StyleEntry { term: "ikat", canonical: "ikat", region: "Odisha" },
];

fn lookup<'a>(table: &'a [(&str, &str)], token: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(term, _)| *term == token)
        .map(|(_, canonical)| *canonical)
}

pub fn color(token: &str) -> Option<&'static str> {
    lookup(COLORS, token)
}

pub fn material(token: &str) -> Option<&'static str> {
    lookup(MATERIALS, token)
}

pub fn product(token: &str) -> Option<&'static str> {
    lookup(PRODUCTS, token)
}

pub fn style(token: &str) -> Option<&'static StyleEntry> {
    STYLES.iter().find(|s| s.term == token)
}
