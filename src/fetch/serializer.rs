use std::fmt::{self, Write};

use crate::fetch::{FetchAttribute, FetchCondition, FetchEntity, FetchFilter, FetchLinkEntity, FetchOrder, FetchXml, FilterItem, FilterType};

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn attr(f: &mut impl Write, name: &str, value: &str) -> fmt::Result {
    write!(f, " {}=\"{}\"", name, escape(value))
}

fn flag(f: &mut impl Write, name: &str, value: bool) -> fmt::Result {
    if value {
        attr(f, name, "true")?;
    }
    Ok(())
}

fn write_attribute(f: &mut impl Write, a: &FetchAttribute) -> fmt::Result {
    write!(f, "<attribute")?;
    attr(f, "name", &a.name)?;
    if let Some(alias) = &a.alias {
        attr(f, "alias", alias)?;
    }
    if let Some(aggregate) = a.aggregate {
        attr(f, "aggregate", aggregate.as_str())?;
    }
    flag(f, "groupby", a.group_by)?;
    flag(f, "distinct", a.distinct)?;
    write!(f, " />")
}

fn write_condition(f: &mut impl Write, c: &FetchCondition) -> fmt::Result {
    write!(f, "<condition")?;
    attr(f, "attribute", &c.attribute)?;
    attr(f, "operator", c.operator.as_str())?;
    if let Some(value) = &c.value {
        attr(f, "value", value)?;
    }
    if let Some(other) = &c.value_of {
        attr(f, "valueof", other)?;
    }
    if c.values.is_empty() {
        return write!(f, " />");
    }
    write!(f, ">")?;
    for v in &c.values {
        write!(f, "<value>{}</value>", escape(v))?;
    }
    write!(f, "</condition>")
}

fn write_filter(f: &mut impl Write, filter: &FetchFilter) -> fmt::Result {
    write!(f, "<filter")?;
    if filter.filter_type == FilterType::Or {
        attr(f, "type", "or")?;
    }
    write!(f, ">")?;
    for item in &filter.items {
        match item {
            FilterItem::Condition(c) => write_condition(f, c)?,
            FilterItem::Filter(inner) => write_filter(f, inner)?,
        }
    }
    write!(f, "</filter>")
}

fn write_order(f: &mut impl Write, order: &FetchOrder) -> fmt::Result {
    write!(f, "<order")?;
    if let Some(a) = &order.attribute {
        attr(f, "attribute", a)?;
    }
    if let Some(a) = &order.alias {
        attr(f, "alias", a)?;
    }
    flag(f, "descending", order.descending)?;
    write!(f, " />")
}

fn write_content(f: &mut impl Write, entity: &FetchEntity) -> fmt::Result {
    if entity.all_attributes {
        write!(f, "<all-attributes />")?;
    }
    for a in &entity.attributes {
        write_attribute(f, a)?;
    }
    for filter in &entity.filters {
        write_filter(f, filter)?;
    }
    for link in &entity.links {
        write_link(f, link)?;
    }
    for order in &entity.orders {
        write_order(f, order)?;
    }
    Ok(())
}

fn write_link(f: &mut impl Write, link: &FetchLinkEntity) -> fmt::Result {
    write!(f, "<link-entity")?;
    attr(f, "name", &link.entity.name)?;
    attr(f, "from", &link.from)?;
    attr(f, "to", &link.to)?;
    attr(f, "alias", &link.alias)?;
    attr(f, "link-type", link.link_type.as_str())?;
    write!(f, ">")?;
    write_content(f, &link.entity)?;
    write!(f, "</link-entity>")
}

/// Compact FetchXML text.
impl fmt::Display for FetchXml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fetch")?;
        if let Some(top) = self.top {
            attr(f, "top", &top.to_string())?;
        }
        if let Some(page) = self.page {
            attr(f, "page", &page.to_string())?;
        }
        if let Some(count) = self.count {
            attr(f, "count", &count.to_string())?;
        }
        if let Some(cookie) = &self.paging_cookie {
            attr(f, "paging-cookie", cookie)?;
        }
        flag(f, "distinct", self.distinct)?;
        flag(f, "aggregate", self.aggregate)?;
        flag(f, "no-lock", self.no_lock)?;
        write!(f, ">")?;
        write!(f, "<entity")?;
        attr(f, "name", &self.entity.name)?;
        write!(f, ">")?;
        write_content(f, &self.entity)?;
        write!(f, "</entity></fetch>")
    }
}

#[cfg(test)]
mod tests {
    use crate::fetch::{
        AggregateType, ConditionOperator, FetchAttribute, FetchCondition, FetchEntity, FetchFilter,
        FetchLinkEntity, FetchOrder, FetchXml, FilterItem, FilterType, LinkType,
    };

    #[test]
    fn serializes_every_element_kind_filters_before_links() {
        let mut fetch = FetchXml::new("account");
        fetch.top = Some(10);
        fetch.no_lock = true;
        fetch.entity.attributes.push(FetchAttribute::new("name"));
        fetch.entity.attributes.push(FetchAttribute {
            name: "accountid".into(),
            alias: Some("accountid_count".into()),
            aggregate: Some(AggregateType::Count),
            ..Default::default()
        });
        let mut contact = FetchEntity::new("contact");
        contact.attributes.push(FetchAttribute::new("firstname"));
        contact.orders.push(FetchOrder::attribute("firstname", false));
        fetch.entity.links.push(FetchLinkEntity {
            from: "contactid".into(),
            to: "primarycontactid".into(),
            alias: "c".into(),
            link_type: LinkType::Outer,
            entity: contact,
        });
        fetch.entity.filters.push(FetchFilter::new(FilterType::Or, vec![
            FilterItem::Condition(FetchCondition::new("name", ConditionOperator::Equal, Some("A & B".into()))),
            FilterItem::Filter(FetchFilter::new(FilterType::And, vec![
                FilterItem::Condition(FetchCondition::multi("name", ConditionOperator::In, vec!["x".into(), "y".into()])),
                FilterItem::Condition(FetchCondition::value_of("name", ConditionOperator::NotEqual, "accountnumber")),
            ])),
        ]));
        fetch.entity.orders.push(FetchOrder::alias("accountid_count", true));

        assert_eq!(
            fetch.to_xml(),
            concat!(
                "<fetch top=\"10\" no-lock=\"true\"><entity name=\"account\">",
                "<attribute name=\"name\" />",
                "<attribute name=\"accountid\" alias=\"accountid_count\" aggregate=\"count\" />",
                "<filter type=\"or\"><condition attribute=\"name\" operator=\"eq\" value=\"A &amp; B\" />",
                "<filter><condition attribute=\"name\" operator=\"in\"><value>x</value><value>y</value></condition>",
                "<condition attribute=\"name\" operator=\"ne\" valueof=\"accountnumber\" /></filter></filter>",
                "<link-entity name=\"contact\" from=\"contactid\" to=\"primarycontactid\" alias=\"c\" link-type=\"outer\">",
                "<attribute name=\"firstname\" /><order attribute=\"firstname\" />",
                "</link-entity>",
                "<order alias=\"accountid_count\" descending=\"true\" />",
                "</entity></fetch>"
            )
        );
    }
}
