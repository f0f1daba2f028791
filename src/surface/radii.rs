//! Van der Waals radii by element (Å).

/// Radius used for elements missing from the table.
pub const DEFAULT_VDW_RADIUS: f32 = 1.7;

/// Van der Waals radius of `element` (case-insensitive symbol).
#[must_use]
pub fn vdw_radius(element: &str) -> f32 {
    match element.trim().to_ascii_uppercase().as_str() {
        "H" | "D" => 1.1,
        "HE" => 1.4,
        "LI" => 1.82,
        "B" => 1.92,
        "C" => 1.7,
        "N" => 1.55,
        "O" => 1.52,
        "F" => 1.47,
        "NE" => 1.54,
        "NA" => 2.27,
        "MG" => 1.73,
        "AL" => 1.84,
        "SI" => 2.1,
        "P" | "S" => 1.8,
        "CL" => 1.75,
        "AR" => 1.88,
        "K" => 2.75,
        "CA" => 2.31,
        "MN" | "FE" | "CO" => 2.0,
        "NI" => 1.63,
        "CU" => 1.4,
        "ZN" => 1.39,
        "GA" => 1.87,
        "AS" => 1.85,
        "SE" => 1.9,
        "BR" => 1.85,
        "KR" => 2.02,
        "RB" => 3.03,
        "SR" => 2.49,
        "CD" => 1.58,
        "I" => 1.98,
        "XE" => 2.16,
        "CS" => 3.43,
        "BA" => 2.68,
        "PT" => 1.75,
        "AU" => 1.66,
        "HG" => 1.55,
        "PB" => 2.02,
        "U" => 1.86,
        _ => DEFAULT_VDW_RADIUS,
    }
}

/// Element symbol for an atom, falling back to the first letter of the atom
/// name when the file carries no `type_symbol`.
#[must_use]
pub fn element_of<'a>(type_symbol: &'a str, atom_name: &'a str) -> &'a str {
    if !type_symbol.trim().is_empty() {
        return type_symbol;
    }
    atom_name
        .trim()
        .char_indices()
        .find(|(_, c)| c.is_ascii_alphabetic())
        .map_or("", |(i, c)| &atom_name.trim()[i..i + c.len_utf8()])
}
