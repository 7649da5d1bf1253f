// ABOUTME: Parsers for the information lines modems print in reply to queries
// ABOUTME: Field splitting that honours quotes, plus CLAC, CMGS, CSQ, CREG, COPS and CPMS shapes

use crate::client::types::VendorShape;

/// Splits a comma separated reply body. Commas inside double quotes do not
/// split, and quotes are removed from the fields.
pub(crate) fn split_fields(body: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in body.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// The body of the first line carrying `prefix`, trimmed
pub(crate) fn prefixed<'a>(lines: &'a [String], prefix: &str) -> Option<&'a str> {
    lines
        .iter()
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::trim)
}

/// Interprets an `AT+CLAC` reply. `None` means the reply held no usable
/// list and commands have to be probed.
pub(crate) fn parse_clac(lines: &[String]) -> Option<(VendorShape, Vec<String>)> {
    let lines: Vec<&str> = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    let structured: Vec<&str> = lines
        .iter()
        .filter_map(|line| line.strip_prefix("+CLAC:"))
        .collect();
    if !structured.is_empty() {
        return Some((VendorShape::StructuredList, split_commands(&structured)));
    }
    Some((VendorShape::UnprefixedLines, split_commands(&lines)))
}

fn split_commands(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| line.split(','))
        .map(|command| command.trim().to_string())
        .filter(|command| !command.is_empty())
        .collect()
}

/// Message reference from `+CMGS: <mr>`
pub(crate) fn parse_cmgs(lines: &[String]) -> Option<u8> {
    prefixed(lines, "+CMGS:")?.split(',').next()?.trim().parse().ok()
}

/// Signal quality from `+CSQ: <rssi>,<ber>`; 99 means unknown
pub(crate) fn parse_csq(lines: &[String]) -> Option<u8> {
    let rssi: u8 = prefixed(lines, "+CSQ:")?.split(',').next()?.trim().parse().ok()?;
    (rssi != 99).then_some(rssi)
}

/// Registration status from `+CREG: <n>,<stat>` (or the unsolicited
/// single-field form)
pub(crate) fn parse_creg(lines: &[String]) -> Option<u8> {
    let fields = split_fields(prefixed(lines, "+CREG:")?);
    let stat = if fields.len() >= 2 { &fields[1] } else { &fields[0] };
    stat.parse().ok()
}

/// Operator name from `+COPS: <mode>,<format>,"<name>"[,<act>]`
pub(crate) fn parse_cops(lines: &[String]) -> Option<String> {
    let fields = split_fields(prefixed(lines, "+COPS:")?);
    fields.get(2).filter(|name| !name.is_empty()).cloned()
}

/// SMSC number from `+CSCA: "<number>",<type>`
pub(crate) fn parse_csca(lines: &[String]) -> Option<String> {
    let fields = split_fields(prefixed(lines, "+CSCA:")?);
    fields.into_iter().next().filter(|number| !number.is_empty())
}

/// Functionality level from `+CFUN: <fun>`
pub(crate) fn parse_cfun(lines: &[String]) -> Option<u8> {
    prefixed(lines, "+CFUN:")?.split(',').next()?.trim().parse().ok()
}

/// Entries of the first parenthesised group, e.g. the read memories in
/// `+CPMS: ("ME","SM"),("ME","SM"),("ME","SM")` or the charsets in
/// `+CSCS: ("GSM","UCS2")`
pub(crate) fn parse_first_group(lines: &[String], prefix: &str) -> Vec<String> {
    let Some(body) = prefixed(lines, prefix) else {
        return Vec::new();
    };
    let group = match (body.find('('), body.find(')')) {
        (Some(open), Some(close)) if open < close => &body[open + 1..close],
        _ => body,
    };
    split_fields(group)
        .into_iter()
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Storage location from `+CMTI: "<mem>",<index>` (also `+CDSI:`)
pub(crate) fn parse_storage_indication(body: &str) -> Option<(String, u32)> {
    let fields = split_fields(body);
    let index = fields.get(1)?.parse().ok()?;
    Some((fields[0].clone(), index))
}

/// Caller number from `+CLIP: "<number>",<type>,...`
pub(crate) fn parse_clip(body: &str) -> Option<String> {
    split_fields(body)
        .into_iter()
        .next()
        .filter(|number| !number.is_empty())
}

/// One `+CLCC:` entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CallListEntry {
    pub id: u32,
    /// 0 = mobile originated
    pub outgoing: bool,
    /// 0 active, 1 held, 2 dialing, 3 alerting, 4 incoming, 5 waiting
    pub stat: u8,
    pub number: Option<String>,
}

pub(crate) fn parse_clcc(lines: &[String]) -> Vec<CallListEntry> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("+CLCC:"))
        .filter_map(|body| {
            let fields = split_fields(body);
            Some(CallListEntry {
                id: fields.first()?.parse().ok()?,
                outgoing: fields.get(1)? == "0",
                stat: fields.get(2)?.parse().ok()?,
                number: fields.get(5).filter(|n| !n.is_empty()).cloned(),
            })
        })
        .collect()
}

/// Leading id of vendor call events such as `^CONN:1,0` or `+WIND: 6,1`
pub(crate) fn leading_numbers(body: &str) -> Vec<u32> {
    body.split(',')
        .map_while(|field| field.trim().parse().ok())
        .collect()
}
